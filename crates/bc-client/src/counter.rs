//! Persisted conversion counter.
//!
//! The count lives under the `beatscoin-count` key of a small JSON state file.
//! It is read once when loaded and written back on every increment. Other
//! keys in the file are preserved. There is no locking: two clients sharing a
//! state directory may lose increments.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

/// Key under which the count is stored.
pub const COUNTER_KEY: &str = "beatscoin-count";

/// State file name inside the client state directory.
pub const STATE_FILE: &str = "state.json";

/// Number of completed downloads.
#[derive(Debug)]
pub struct ConversionCounter {
    path: PathBuf,
    state: Map<String, Value>,
    count: u64,
}

impl ConversionCounter {
    /// Load the counter from `<state_dir>/state.json`.
    ///
    /// A missing or unreadable file yields a count of zero.
    pub fn load(state_dir: &Path) -> Self {
        let path = state_dir.join(STATE_FILE);

        let state = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Map<String, Value>>(&contents) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("Ignoring corrupt state file {}: {e}", path.display());
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                tracing::warn!("Failed to read state file {}: {e}", path.display());
                Map::new()
            }
        };

        let count = state.get(COUNTER_KEY).and_then(parse_count).unwrap_or(0);

        Self { path, state, count }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Path of the backing state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add one and persist. The in-memory count only moves if the write
    /// succeeds.
    pub fn increment(&mut self) -> bc_core::Result<u64> {
        let next = self.count + 1;

        let mut state = self.state.clone();
        state.insert(COUNTER_KEY.to_string(), Value::from(next));

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| bc_core::Error::Internal(format!("failed to serialize state: {e}")))?;
        std::fs::write(&self.path, json)?;

        self.state = state;
        self.count = next;
        tracing::debug!(count = next, "Conversion counter updated");
        Ok(next)
    }
}

/// Accept both numbers and numeric strings (browser storage keeps strings).
fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
