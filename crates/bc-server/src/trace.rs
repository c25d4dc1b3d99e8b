//! Request ids and per-request tracing spans.
//!
//! `SetRequestIdLayer` stamps every request with an `x-request-id` (kept if
//! the client sent one), [`RequestSpan`] opens a span carrying that id and
//! the matched route, and `PropagateRequestIdLayer` copies the id onto the
//! response. Conversion logs and JSON errors therefore share one id.

use axum::extract::MatchedPath;
use axum::http::{HeaderMap, HeaderName, Request};
use tower_http::request_id::RequestId;
use tower_http::trace::MakeSpan;
use tracing::Span;

/// Header carrying the request id.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Longest client-supplied id recorded in spans.
const MAX_ID_LEN: usize = 128;

/// Builds the `request` span for each HTTP request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str())
            .unwrap_or_else(|| request.uri().path());

        tracing::info_span!(
            "request",
            request_id = header_request_id(request.headers()),
            method = %request.method(),
            route = %route,
        )
    }
}

/// The id from `x-request-id`, or `-` when it is missing or unusable.
pub fn header_request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_ID_LEN)
        .unwrap_or("-")
}

/// The id stored in request extensions by `SetRequestIdLayer`.
pub fn request_id_str(id: &RequestId) -> &str {
    id.header_value().to_str().unwrap_or("-")
}
