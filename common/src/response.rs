//! API response wrapper types.
//!
//! Session and database-management endpoints answer with `ApiResponse`;
//! every failure, on every endpoint, answers with a flat `ErrorBody` so a
//! client can always read `success` and `message` at the top level.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard success wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,

    /// Human-readable summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Response data (present on success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    /// Response metadata.
    pub meta: ResponseMeta,
}

/// Flat failure body shared by every endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,

    /// Human-readable error message.
    pub message: String,

    /// Error class for client handling (e.g. "validation", "safety").
    pub error_type: String,

    /// Driver error number when the failure came from MySQL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,
}

impl ErrorBody {
    /// Creates a failure body.
    pub fn new(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error_type: error_type.into(),
            error_code: None,
        }
    }

    /// Attaches a driver error number.
    pub fn with_code(mut self, code: Option<u16>) -> Self {
        self.error_code = code;
        self
    }
}

/// Response metadata.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResponseMeta {
    /// Request ID for tracing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Response timestamp.
    pub timestamp: DateTime<Utc>,

    /// Service name that handled the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

impl Default for ResponseMeta {
    fn default() -> Self {
        Self {
            request_id: None,
            timestamp: Utc::now(),
            service: None,
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response with data.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            meta: ResponseMeta::default(),
        }
    }

    /// Creates a successful response with data and a summary message.
    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(data)
        }
    }

    /// Sets the request ID on the response.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.meta.request_id = Some(request_id.into());
        self
    }

    /// Sets the service name on the response.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.meta.service = Some(service.into());
        self
    }
}

impl ApiResponse<()> {
    /// Creates a success response without data.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            meta: ResponseMeta::default(),
        }
    }
}
