use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Liveness check.
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
