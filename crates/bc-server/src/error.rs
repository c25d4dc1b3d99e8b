//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`bc_core::Error`] so that route handlers
//! can return `Result<T, AppError>` directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
pub struct AppError {
    inner: bc_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: bc_core::Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }
}

impl From<bc_core::Error> for AppError {
    fn from(e: bc_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                request_id = self.request_id.as_deref().unwrap_or("-"),
                "Server error in API handler"
            );
        } else {
            tracing::debug!(status = %status, error = %self.inner, "Client error");
        }

        let code = match &self.inner {
            bc_core::Error::Validation(_) => "validation_error",
            bc_core::Error::PayloadTooLarge(_) => "payload_too_large",
            bc_core::Error::InsufficientTokens { .. } => "insufficient_tokens",
            bc_core::Error::Encoder { .. } => "conversion_failed",
            bc_core::Error::Remote { .. } => "remote_error",
            bc_core::Error::Transport(_) => "transport_error",
            bc_core::Error::Io { .. } => "io_error",
            bc_core::Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.inner.public_message(),
            "code": code,
            "request_id": self.request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}
