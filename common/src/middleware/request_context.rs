//! Request context middleware.
//!
//! Attaches a request id and the caller's network address to every
//! request, echoes the id back in `x-request-id`, and runs the rest of the
//! stack inside a `request` span carrying both.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts},
    http::{header::HeaderName, request::Parts, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::utils::IdGenerator;

/// Header carrying the request ID.
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Header set by reverse proxies with the original client address.
pub static FORWARDED_FOR_HEADER: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Per-request identity used in logs and audit lines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    /// Request id (client supplied or generated).
    pub request_id: String,
    /// Caller address, or `unknown`.
    pub client_addr: String,
}

impl RequestContext {
    fn from_parts(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let request_id = headers
            .get(&REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
            .unwrap_or_else(IdGenerator::request_id);

        let client_addr = headers
            .get(&FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            request_id,
            client_addr,
        }
    }
}

fn peer_addr(parts_ext: &axum::http::Extensions) -> Option<SocketAddr> {
    parts_ext
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Request context middleware handler.
///
/// Reuses an incoming `x-request-id` header when present.
pub async fn request_context_middleware(mut req: Request<Body>, next: Next) -> Response {
    let context = RequestContext::from_parts(req.headers(), peer_addr(req.extensions()));
    req.extensions_mut().insert(context.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %context.request_id,
        client = %context.client_addr,
        method = %req.method(),
        uri = %req.uri(),
    );

    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&context.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }

    response
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<RequestContext>() {
            return Ok(context.clone());
        }
        Ok(Self::from_parts(&parts.headers, peer_addr(&parts.extensions)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_for_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR_HEADER.clone(),
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let context = RequestContext::from_parts(&headers, Some(peer));
        assert_eq!(context.client_addr, "203.0.113.9");
    }

    #[test]
    fn test_peer_address_fallback() {
        let peer: SocketAddr = "192.168.1.20:5000".parse().unwrap();
        let context = RequestContext::from_parts(&HeaderMap::new(), Some(peer));
        assert_eq!(context.client_addr, "192.168.1.20");
    }

    #[test]
    fn test_unknown_without_peer() {
        let context = RequestContext::from_parts(&HeaderMap::new(), None);
        assert_eq!(context.client_addr, "unknown");
        assert!(!context.request_id.is_empty());
    }

    #[test]
    fn test_incoming_request_id_is_reused() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER.clone(), HeaderValue::from_static("abc-123"));
        let context = RequestContext::from_parts(&headers, None);
        assert_eq!(context.request_id, "abc-123");
    }
}
