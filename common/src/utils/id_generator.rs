//! Unique ID generator.
//!
//! Provides identifiers for sessions and requests.

use uuid::Uuid;

/// Generates unique identifiers.
pub struct IdGenerator;

impl IdGenerator {
    /// Generates a session id: 32 lowercase hex characters, safe in headers.
    pub fn session_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Generates a request id for tracing.
    pub fn request_id() -> String {
        Uuid::new_v4().to_string()
    }
}
