//! Middleware components for all services.

pub mod request_context;
pub mod session;

// Re-export commonly used types
pub use request_context::{request_context_middleware, RequestContext, REQUEST_ID_HEADER};
pub use session::{SessionToken, SESSION_HEADER};
