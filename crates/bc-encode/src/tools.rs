//! Encoder discovery.
//!
//! [`check_encoder`] resolves the configured encoder program on `PATH` (or
//! as a literal path) and reports whether it can be run.

use std::path::{Path, PathBuf};

use bc_core::config::EncoderConfig;
use serde::{Deserialize, Serialize};

/// Availability information for the configured encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderInfo {
    /// Program as written in the config.
    pub program: String,
    /// Whether the program was found.
    pub available: bool,
    /// Version string (first line of `--version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
    /// Leading arguments that are not found on disk although they look like
    /// paths (e.g. a missing script).
    pub missing_args: Vec<String>,
}

/// Locate the encoder program and read its version.
pub fn check_encoder(config: &EncoderConfig) -> EncoderInfo {
    let resolved = which::which(&config.program).ok();
    let version = resolved.as_deref().and_then(detect_version);

    let missing_args = config
        .args
        .iter()
        .filter(|a| looks_like_path(a) && !Path::new(a.as_str()).exists())
        .cloned()
        .collect();

    EncoderInfo {
        program: config.program.clone(),
        available: resolved.is_some(),
        version,
        path: resolved,
        missing_args,
    }
}

fn looks_like_path(arg: &str) -> bool {
    !arg.starts_with('-') && (arg.contains('/') || arg.ends_with(".py"))
}

/// Run `<program> --version` and return the first non-empty line of stdout
/// (or stderr, where Python 2 prints it).
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("--version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|s| s.to_string())
}
