//! bc-server: the HTTP conversion endpoint.
//!
//! This crate wires the encoder from `bc-encode` into an Axum application:
//!
//! - `POST /api/convert` accepts one multipart `file` field, runs the encoder
//!   and streams the artifact back
//! - `GET /health` for liveness checks
//! - optional static serving of a front-end bundle
//! - graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod router;
pub mod routes;
pub mod trace;

use std::net::SocketAddr;

use bc_core::config::Config;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

/// Start the beatscoin server.
///
/// Returns when a shutdown signal is received or `cancel` is triggered.
pub async fn start(config: Config, cancel: CancellationToken) -> bc_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let encoder = bc_encode::check_encoder(&config.encoder);
    if encoder.available {
        tracing::info!(
            "Encoder found: {} ({})",
            encoder.program,
            encoder.version.as_deref().unwrap_or("unknown version")
        );
    } else {
        tracing::warn!(
            "Encoder program '{}' not found; conversions will fail",
            encoder.program
        );
    }
    for arg in &encoder.missing_args {
        tracing::warn!("Encoder argument '{arg}' does not exist on disk");
    }

    let scratch_dir = config.server.scratch_dir();
    if !scratch_dir.exists() {
        std::fs::create_dir_all(&scratch_dir)?;
        tracing::info!("Created scratch directory {}", scratch_dir.display());
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| bc_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let static_dir = config.server.static_dir.clone();
    let ctx = AppContext::new(config);
    let app = router::build_router(ctx, static_dir);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| bc_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Starting server on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
