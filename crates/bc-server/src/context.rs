//! Application context shared by all request handlers (via Axum state).

use std::path::PathBuf;
use std::sync::Arc;

use bc_core::config::Config;
use bc_encode::EncoderCommand;

/// Cheaply cloneable handler state.
///
/// Nothing in here is mutable: requests share no state beyond the scratch
/// directory, and they stay apart there through unique file names.
#[derive(Clone)]
pub struct AppContext {
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// The external encoder invocation.
    pub encoder: Arc<EncoderCommand>,
    /// Directory holding per-request scratch files.
    pub scratch_dir: PathBuf,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        let encoder = EncoderCommand::from_config(&config.encoder);
        let scratch_dir = config.server.scratch_dir();
        Self {
            config: Arc::new(config),
            encoder: Arc::new(encoder),
            scratch_dir,
        }
    }

    /// Extension given to encoder output files, taken from the artifact name.
    pub fn output_extension(&self) -> &str {
        self.config
            .artifact
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or("bin")
    }
}
