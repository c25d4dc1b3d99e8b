//! Sequential status-line playback.
//!
//! A [`Playback`] owns a single worker task that drains an ordered queue of
//! [`Cue`]s. Lines are typed out one character at a time with a fixed delay;
//! actions run as soon as they reach the front of the queue. Anything
//! enqueued while the worker is busy (including from inside an action) goes
//! to the back of the same queue, so there is only ever one drain.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One item of the playback queue.
pub enum Cue {
    /// Text typed out character by character, followed by a newline.
    Line(String),
    /// Side effect run immediately when dequeued.
    Action(Box<dyn FnOnce() + Send>),
}

impl std::fmt::Debug for Cue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cue::Line(text) => f.debug_tuple("Line").field(text).finish(),
            Cue::Action(_) => f.write_str("Action(..)"),
        }
    }
}

/// Cloneable enqueue handle, usable from inside actions.
#[derive(Clone)]
pub struct PlaybackHandle {
    tx: mpsc::UnboundedSender<Cue>,
}

impl PlaybackHandle {
    /// Append a line to the back of the queue.
    pub fn line(&self, text: impl Into<String>) {
        self.push(Cue::Line(text.into()));
    }

    /// Append an action to the back of the queue.
    pub fn action(&self, f: impl FnOnce() + Send + 'static) {
        self.push(Cue::Action(Box::new(f)));
    }

    /// Append a cue. Silently dropped once the worker has stopped.
    pub fn push(&self, cue: Cue) {
        if self.tx.send(cue).is_err() {
            tracing::trace!("Playback stopped; cue dropped");
        }
    }
}

/// The playback queue and its worker.
pub struct Playback {
    handle: PlaybackHandle,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl Playback {
    /// Spawn the worker, writing to `sink` with `char_delay` between
    /// characters. A zero delay writes each line without pausing.
    pub fn spawn<W>(sink: W, char_delay: Duration) -> Self
    where
        W: Write + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(drain(rx, sink, char_delay, cancel.clone()));

        Self {
            handle: PlaybackHandle { tx },
            cancel,
            worker,
        }
    }

    /// A handle for enqueuing from elsewhere (actions, other tasks).
    pub fn handle(&self) -> PlaybackHandle {
        self.handle.clone()
    }

    /// Append a line to the back of the queue.
    pub fn line(&self, text: impl Into<String>) {
        self.handle.line(text);
    }

    /// Append an action to the back of the queue.
    pub fn action(&self, f: impl FnOnce() + Send + 'static) {
        self.handle.action(f);
    }

    /// Stop at the next character boundary and discard pending cues.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether [`Playback::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until every queued cue, including cues appended by actions, has
    /// been played.
    pub async fn finish(self) {
        let Playback { handle, worker, .. } = self;
        // The worker stops once this and every outstanding clone are gone.
        drop(handle);
        if let Err(e) = worker.await {
            tracing::error!("Playback worker panicked: {e}");
        }
    }

    /// Cancel and wait for the worker to stop.
    pub async fn abort(self) {
        self.cancel();
        self.finish().await;
    }
}

async fn drain<W: Write>(
    mut rx: mpsc::UnboundedReceiver<Cue>,
    mut sink: W,
    char_delay: Duration,
    cancel: CancellationToken,
) {
    loop {
        let cue = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            cue = rx.recv() => match cue {
                Some(cue) => cue,
                // Every handle is gone and the queue is empty.
                None => break,
            },
        };

        match cue {
            Cue::Action(f) => f(),
            Cue::Line(text) => {
                if !type_line(&mut sink, &text, char_delay, &cancel).await {
                    break;
                }
            }
        }
    }

    // Discard whatever is left so queued actions never run after a cancel.
    rx.close();
    while rx.try_recv().is_ok() {}

    if let Err(e) = sink.flush() {
        tracing::debug!("Playback sink flush failed: {e}");
    }
}

/// Type `text` plus a newline. Returns `false` if cancelled midway.
async fn type_line<W: Write>(
    sink: &mut W,
    text: &str,
    char_delay: Duration,
    cancel: &CancellationToken,
) -> bool {
    if char_delay.is_zero() {
        if let Err(e) = writeln!(sink, "{text}").and_then(|_| sink.flush()) {
            tracing::debug!("Playback sink write failed: {e}");
        }
        return !cancel.is_cancelled();
    }

    let mut buf = [0u8; 4];
    for ch in text.chars().chain(std::iter::once('\n')) {
        if cancel.is_cancelled() {
            return false;
        }
        let encoded = ch.encode_utf8(&mut buf);
        if let Err(e) = sink.write_all(encoded.as_bytes()).and_then(|_| sink.flush()) {
            tracing::debug!("Playback sink write failed: {e}");
        }
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(char_delay) => {}
        }
    }
    true
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Writes to the process's standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl Write for StdoutSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::stdout().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stdout().flush()
    }
}

/// In-memory sink whose clones share one buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink(Arc<Mutex<Vec<u8>>>);

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).to_string()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
