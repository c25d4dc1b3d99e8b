//! Axum router construction.
//!
//! Builds the application router with the conversion endpoint, middleware
//! layers, and optional static file serving.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::routes;
use crate::trace::{RequestSpan, X_REQUEST_ID};

/// Build the complete Axum router.
///
/// Only `POST` is routed on `/api/convert`; any other method gets a 405 from
/// Axum before a handler (and therefore the encoder) is reached.
pub fn build_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, X_REQUEST_ID.clone()])
        .expose_headers([header::CONTENT_DISPOSITION, X_REQUEST_ID.clone()]);

    let upload_limit = ctx.config.server.max_upload_bytes();

    let api_routes = Router::new().route(
        "/convert",
        post(routes::convert::convert).layer(DefaultBodyLimit::max(upload_limit)),
    );

    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(RequestSpan))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeRequestUuid))
        .with_state(ctx);

    // Serve the front-end bundle if configured.
    // Uses SPA fallback: serves index.html for any route that doesn't match a file.
    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {}", dir.display());
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(ServeFile::new(index_path)),
            );
        } else {
            tracing::warn!("Static dir {} does not exist; not serving it", dir.display());
        }
    }

    app
}
