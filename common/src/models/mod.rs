//! Shared data models for all microservices.

pub mod connection;
pub mod database;
pub mod query;

// Re-export commonly used types
pub use connection::{ConnectRequest, ConnectionConfig, ConnectionSummary};
pub use database::{CreateDatabaseRequest, DatabaseItem, ListDatabasesRequest};
pub use query::{QueryClassification, QueryRequest, QueryRequestBody, Row, TargetOutcome};
