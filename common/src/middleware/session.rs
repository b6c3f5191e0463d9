//! Session token extraction.
//!
//! Clients receive a session id from `POST /api/connect` and send it back
//! in the `x-session-id` header.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header::HeaderName, request::Parts},
};

/// Header carrying the session id.
pub static SESSION_HEADER: HeaderName = HeaderName::from_static("x-session-id");

/// The caller's session id, if any. Extraction never fails; a missing or
/// blank header yields `None` and the handler decides how to fail.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionToken(pub Option<String>);

impl SessionToken {
    /// Returns the token string.
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for SessionToken {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(&SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);
        Ok(Self(token))
    }
}
