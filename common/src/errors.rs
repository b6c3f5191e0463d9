//! Error types.
//!
//! `AppError` covers failures that stop a whole request. `TargetError`
//! covers failures of a single target database inside a batch; those are
//! folded into that target's outcome and never abort its siblings.

use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use validator::ValidationErrors;

use crate::response::ErrorBody;

/// Request-level error.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed request; raised before any policy check.
    #[error("{0}")]
    Validation(String),

    /// Request body over the configured size limit.
    #[error("Request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    /// Statement blocked by the safety policy; raised before any connection.
    #[error("{0}")]
    SafetyViolation(String),

    /// No connection configuration is attached to the caller's session.
    #[error("no active connection")]
    NoActiveConnection,

    /// Unknown or expired session id.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The database server could not be reached or refused the login.
    #[error("{message}")]
    DatabaseConnection {
        message: String,
        code: Option<u16>,
    },

    /// A statement failed on the database server.
    #[error("{message}")]
    DatabaseQuery {
        message: String,
        code: Option<u16>,
    },

    /// The resource being created already exists.
    #[error("{0}")]
    AlreadyExists(String),

    /// A peer service failed or returned garbage.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// A response body could not be serialized.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Machine-readable error type used in response bodies.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::SafetyViolation(_) => "safety",
            Self::NoActiveConnection => "no_connection",
            Self::SessionNotFound(_) => "session_not_found",
            Self::DatabaseConnection { .. } => "connection",
            Self::DatabaseQuery { .. } => "driver",
            Self::AlreadyExists(_) => "already_exists",
            Self::ExternalService(_) => "external_service",
            Self::Encoding(_) => "json_encoding",
            Self::Internal(_) => "general",
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NoActiveConnection => StatusCode::UNAUTHORIZED,
            Self::SafetyViolation(_) => StatusCode::FORBIDDEN,
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::DatabaseConnection { .. } => StatusCode::BAD_GATEWAY,
            Self::ExternalService(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseQuery { .. } | Self::Encoding(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Driver error number, when the error came from the database server.
    pub fn error_code(&self) -> Option<u16> {
        match self {
            Self::DatabaseConnection { code, .. } | Self::DatabaseQuery { code, .. } => *code,
            _ => None,
        }
    }

    /// Body rendered for this error.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody::new(self.to_string(), self.error_type()).with_code(self.error_code())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self.status_code() {
            status if status.is_server_error() => {
                tracing::error!(error = %self, error_type = self.error_type(), "request failed")
            }
            _ => tracing::debug!(error = %self, error_type = self.error_type(), "request rejected"),
        }
        (self.status_code(), Json(self.to_body())).into_response()
    }
}

impl AppError {
    /// Builds a `Validation` error from the first failing field.
    ///
    /// Fields named in `field_order` are reported first, in that order; the
    /// rest follow by name, so the message is the same for the same input.
    pub fn from_validation(errors: &ValidationErrors, field_order: &[&str]) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| {
            let rank = field_order
                .iter()
                .position(|f| *f == &**field)
                .unwrap_or(field_order.len());
            (rank, field.to_string())
        });

        let message = fields
            .into_iter()
            .find_map(|(field, errs)| {
                errs.first().map(|e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("invalid value for `{field}`"),
                })
            })
            .unwrap_or_else(|| "invalid request".to_string());
        Self::Validation(message)
    }
}

impl AppError {
    /// Maps a failed body read onto a JSON-renderable error.
    ///
    /// An over-limit body becomes `PayloadTooLarge`; any other read failure
    /// is a `Validation` error.
    pub fn from_body_rejection(rejection: &BytesRejection, limit: usize) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge { limit }
        } else {
            Self::Validation(format!("Unreadable request body: {}", rejection.body_text()))
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        Self::from_validation(&errors, &[])
    }
}

/// Details of a failure reported by the MySQL driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverFault {
    /// Human-readable message, either a mapped category or the cleaned raw text.
    pub message: String,
    /// MySQL error number, if the server (or client library) produced one.
    pub code: Option<u16>,
    /// Five-character SQLSTATE, if available.
    pub sql_state: Option<String>,
}

impl DriverFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            sql_state: None,
        }
    }
}

/// Failure of a single target inside a batch.
#[derive(Debug, Clone, Error)]
pub enum TargetError {
    /// The target name is not a plain identifier.
    #[error("invalid identifier")]
    InvalidIdentifier(String),

    /// The dedicated connection for this target could not be opened.
    #[error("{}", .0.message)]
    Connection(DriverFault),

    /// The statement failed on this target.
    #[error("{}", .0.message)]
    Driver(DriverFault),

    /// Execution for this target panicked.
    #[error("internal error while executing on this database: {0}")]
    Panicked(String),
}

impl TargetError {
    /// Machine-readable error type used on a failed `TargetOutcome`.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "validation",
            Self::Connection(_) => "connection",
            Self::Driver(_) => "driver",
            Self::Panicked(_) => "internal",
        }
    }

    /// Underlying driver details, if any.
    pub fn fault(&self) -> Option<&DriverFault> {
        match self {
            Self::Connection(fault) | Self::Driver(fault) => Some(fault),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 1, message = "name is required"))]
        name: String,
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::SafetyViolation("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::NoActiveConnection.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_payload_too_large_body() {
        let err = AppError::PayloadTooLarge { limit: 1024 };
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = err.to_body();
        assert_eq!(body.message, "Request body exceeds the 1024 byte limit");
        assert_eq!(body.error_type, "payload_too_large");
    }

    #[test]
    fn test_no_active_connection_message() {
        let body = AppError::NoActiveConnection.to_body();
        assert!(!body.success);
        assert_eq!(body.message, "no active connection");
        assert_eq!(body.error_type, "no_connection");
    }

    #[test]
    fn test_validation_errors_use_first_message() {
        let err: AppError = Probe { name: String::new() }.validate().unwrap_err().into();
        assert_eq!(err.to_string(), "name is required");
        assert_eq!(err.error_type(), "validation");
    }

    #[derive(Validate)]
    struct TwoFields {
        #[validate(length(min = 1, message = "zeta is required"))]
        zeta: String,
        #[validate(length(min = 1, message = "alpha is required"))]
        alpha: String,
    }

    #[test]
    fn test_validation_message_is_stable_across_fields() {
        let errors = TwoFields {
            zeta: String::new(),
            alpha: String::new(),
        }
        .validate()
        .unwrap_err();
        for _ in 0..16 {
            assert_eq!(
                AppError::from(errors.clone()).to_string(),
                "alpha is required"
            );
            assert_eq!(
                AppError::from_validation(&errors, &["zeta"]).to_string(),
                "zeta is required"
            );
        }
    }

    #[test]
    fn test_target_error_keeps_driver_details() {
        let err = TargetError::Driver(DriverFault {
            message: "SQL syntax error".into(),
            code: Some(1064),
            sql_state: Some("42000".into()),
        });
        assert_eq!(err.to_string(), "SQL syntax error");
        assert_eq!(err.error_type(), "driver");
        assert_eq!(err.fault().and_then(|f| f.code), Some(1064));
    }

    #[test]
    fn test_invalid_identifier_message() {
        let err = TargetError::InvalidIdentifier("bad-name".into());
        assert_eq!(err.to_string(), "invalid identifier");
        assert!(err.fault().is_none());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AppError>();
        assert_send_sync::<TargetError>();
    }
}
