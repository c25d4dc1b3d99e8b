//! The submission flow: intro lines, upload, result lines, save.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bc_core::config::ClientConfig;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::counter::ConversionCounter;
use crate::playback::Playback;
use crate::submit::{Artifact, ConvertClient, UploadFile};
use crate::tokens::TokenBalance;

const FEATURE_NOTES: &[&str] = &[
    "- Psychoacoustic optimisation with no audible loss",
    "- High-efficiency Opus encoding (24 kHz mono)",
    "- Temporary files deleted automatically",
];

/// Local state shared across conversions in one client run.
#[derive(Debug, Clone)]
pub struct ClientSession {
    tokens: Arc<Mutex<TokenBalance>>,
    counter: Arc<Mutex<ConversionCounter>>,
}

impl ClientSession {
    pub fn new(tokens: TokenBalance, counter: ConversionCounter) -> Self {
        Self {
            tokens: Arc::new(Mutex::new(tokens)),
            counter: Arc::new(Mutex::new(counter)),
        }
    }

    /// Starting grant from config, counter loaded from the state directory.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            TokenBalance::new(config.starting_tokens),
            ConversionCounter::load(&config.state_dir),
        )
    }

    pub fn balance(&self) -> u64 {
        self.tokens.lock().balance()
    }

    pub fn count(&self) -> u64 {
        self.counter.lock().count()
    }

    pub fn credit(&self, amount: u64) -> u64 {
        self.tokens.lock().credit(amount)
    }
}

/// Outcome of one successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    pub output_path: PathBuf,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub count: u64,
    pub balance: u64,
}

/// Runs conversions against one server, writing status lines to `S`.
pub struct Converter<S> {
    client: ConvertClient,
    session: ClientSession,
    output_dir: PathBuf,
    char_delay: Duration,
    cost: u64,
    sink: S,
}

impl<S> Converter<S>
where
    S: Write + Clone + Send + 'static,
{
    pub fn new(config: &ClientConfig, session: ClientSession, sink: S) -> Self {
        Self {
            client: ConvertClient::new(&config.server_url),
            session,
            output_dir: PathBuf::from("."),
            char_delay: config.char_delay(),
            cost: config.tokens_per_conversion,
            sink,
        }
    }

    /// Directory artifacts are saved into. Defaults to the working directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_char_delay(mut self, delay: Duration) -> Self {
        self.char_delay = delay;
        self
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    /// Convert one file.
    ///
    /// On any failure the playback is cancelled and nothing is saved,
    /// debited or counted.
    pub async fn convert(&self, path: &Path) -> bc_core::Result<ConversionReport> {
        self.session.tokens.lock().ensure(self.cost)?;

        let upload = UploadFile::read(path).await?;
        let playback = Playback::spawn(self.sink.clone(), self.char_delay);

        playback.line(format!("File name: {}", upload.name));
        playback.line(format!("Format: {}", upload.mime));
        playback.line(format!("Initial size: {}", kilobytes(upload.size())));
        playback.line("");
        playback.line("Beatscoin processing...");
        playback.line("");

        let artifact = match self.client.convert(&upload).await {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::warn!(file = %upload.name, "Conversion failed: {e}");
                playback.abort().await;
                return Err(e);
            }
        };

        playback.line(format!("Final size: {}", kilobytes(artifact.size())));
        for note in FEATURE_NOTES {
            playback.line(*note);
        }
        playback.line("");

        let (tx, rx) = oneshot::channel();
        let handle = playback.handle();
        let session = self.session.clone();
        let output_dir = self.output_dir.clone();
        let cost = self.cost;
        let input_bytes = upload.size();

        // The save touches the disk, so it runs on the blocking pool. The
        // cloned handle keeps the queue open until "Download complete" is in.
        playback.action(move || {
            tokio::task::spawn_blocking(move || {
                let result = complete(&session, &output_dir, &artifact, cost).map(
                    |(path, count, balance)| ConversionReport {
                        output_path: path,
                        input_bytes,
                        output_bytes: artifact.size(),
                        count,
                        balance,
                    },
                );
                if result.is_ok() {
                    handle.line("Download complete");
                }
                // The receiver only goes away if the caller was dropped.
                let _ = tx.send(result);
            });
        });

        playback.finish().await;

        rx.await.map_err(|_| {
            bc_core::Error::Internal("playback stopped before the artifact was saved".into())
        })?
    }
}

/// Save the artifact, bump the counter and debit tokens, all under the token
/// lock so the balance cannot move in between.
fn complete(
    session: &ClientSession,
    output_dir: &Path,
    artifact: &Artifact,
    cost: u64,
) -> bc_core::Result<(PathBuf, u64, u64)> {
    let mut tokens = session.tokens.lock();
    tokens.ensure(cost)?;

    let path = save_artifact(output_dir, &artifact.file_name, &artifact.data)?;

    let count = match session.counter.lock().increment() {
        Ok(count) => count,
        Err(e) => {
            // Only the file created above is removed.
            if let Err(rm) = std::fs::remove_file(&path) {
                tracing::warn!("Failed to remove {}: {rm}", path.display());
            }
            return Err(e);
        }
    };
    let balance = tokens.debit(cost)?;

    tracing::info!(path = %path.display(), count, balance, "Artifact saved");
    Ok((path, count, balance))
}

/// Most numbered variants tried before giving up on a free name.
const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// Write `data` to a new file in `dir`, never replacing an existing one.
///
/// `beatscoin.opus` is tried first, then `beatscoin (1).opus`,
/// `beatscoin (2).opus` and so on.
fn save_artifact(dir: &Path, file_name: &str, data: &[u8]) -> bc_core::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    for n in 0..MAX_NAME_ATTEMPTS {
        let path = dir.join(numbered_name(file_name, n));
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = file.write_all(data).and_then(|_| file.sync_all()) {
            drop(file);
            if let Err(rm) = std::fs::remove_file(&path) {
                tracing::warn!("Failed to remove {}: {rm}", path.display());
            }
            return Err(e.into());
        }
        return Ok(path);
    }

    Err(bc_core::Error::Internal(format!(
        "no free name for {file_name} in {}",
        dir.display()
    )))
}

/// `name` for `n == 0`, otherwise `stem (n).ext`.
fn numbered_name(file_name: &str, n: u32) -> String {
    if n == 0 {
        return file_name.to_string();
    }
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{file_name} ({n})"),
    }
}

fn kilobytes(bytes: u64) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}
