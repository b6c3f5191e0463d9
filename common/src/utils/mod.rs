//! Utility functions and helpers.

pub mod driver_error;
pub mod id_generator;
pub mod identifier;
pub mod safety;
pub mod sanitizer;

// Re-export commonly used types
pub use driver_error::{describe_sqlx_error, DriverErrorCategory};
pub use id_generator::IdGenerator;
pub use identifier::is_valid_identifier;
pub use safety::{PolicyDecision, SafetyPolicy};
pub use sanitizer::{RawRow, RawValue, ResultSanitizer};
