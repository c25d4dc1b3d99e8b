//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! sub-configs for the server, the external encoder, the returned artifact,
//! and the terminal client. Every section defaults sensibly so a completely
//! empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub encoder: EncoderConfig,
    pub artifact: ArtifactConfig,
    pub client: ClientConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file, failing on read or parse errors.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None`, the file does not exist, or it fails to parse.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.server.max_upload_mb == 0 {
            warnings.push("server.max_upload_mb is 0; every upload will be rejected".into());
        }

        if let Some(ref dir) = self.server.scratch_dir {
            if !dir.is_dir() {
                warnings.push(format!(
                    "server.scratch_dir {} does not exist",
                    dir.display()
                ));
            }
        }

        if self.encoder.program.trim().is_empty() {
            warnings.push("encoder.program is empty".into());
        }

        if self.encoder.timeout_secs == 0 {
            warnings.push("encoder.timeout_secs is 0; every conversion will time out".into());
        }

        if self.artifact.file_name.contains('"') || self.artifact.file_name.contains('/') {
            warnings.push(format!(
                "artifact.file_name '{}' contains characters that break Content-Disposition",
                self.artifact.file_name
            ));
        }

        if self.client.tokens_per_conversion > self.client.starting_tokens {
            warnings.push(format!(
                "client.starting_tokens ({}) cannot cover a single conversion ({})",
                self.client.starting_tokens, self.client.tokens_per_conversion
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Front-end bundle served with SPA fallback.
    pub static_dir: Option<PathBuf>,
    /// Where scratch files live; `None` means the OS temp directory.
    pub scratch_dir: Option<PathBuf>,
    pub max_upload_mb: u64,
}

impl ServerConfig {
    /// Upload ceiling in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb as usize).saturating_mul(1024 * 1024)
    }

    /// Resolved scratch directory.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            static_dir: None,
            scratch_dir: None,
            max_upload_mb: 50,
        }
    }
}

/// External encoder invocation.
///
/// The encoder is run as `<program> [args...] <input> <output>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub timeout_secs: u64,
}

impl EncoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        let mut env = BTreeMap::new();
        env.insert("PYTHONIOENCODING".to_string(), "utf-8".to_string());
        Self {
            program: "python3".into(),
            args: vec!["scripts/opusprov4.py".into()],
            env,
            timeout_secs: 600,
        }
    }
}

/// How the converted file is presented to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub content_type: String,
    pub file_name: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            content_type: "audio/opus".into(),
            file_name: "beatscoin.opus".into(),
        }
    }
}

/// Terminal client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub char_delay_ms: u64,
    pub starting_tokens: u64,
    pub tokens_per_conversion: u64,
    /// Directory holding the persisted conversion counter.
    pub state_dir: PathBuf,
}

impl ClientConfig {
    pub fn char_delay(&self) -> Duration {
        Duration::from_millis(self.char_delay_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            char_delay_ms: 25,
            starting_tokens: 5,
            tokens_per_conversion: 5,
            state_dir: PathBuf::from("./.beatscoin"),
        }
    }
}
