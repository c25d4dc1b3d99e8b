//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which builds an [`AppContext`] whose encoder is a
//! small `sh -c` script and whose scratch directory is a fresh temp dir. The
//! script sees the input path as `$0` and the output path as `$1`, and
//! touches `$BC_MARKER` so tests can tell whether the encoder ever ran.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::Router;
use bc_core::config::Config;
use bc_server::context::AppContext;
use bc_server::router::build_router;
use tempfile::TempDir;

/// Prefixes the input with `OPUS` so tests can recognise the artifact.
pub const PREFIX_SCRIPT: &str = r#"touch "$BC_MARKER"; { printf 'OPUS'; cat "$0"; } > "$1""#;

/// Fails loudly without writing any output.
pub const FAILING_SCRIPT: &str = r#"touch "$BC_MARKER"; echo "codec exploded" >&2; exit 3"#;

/// Exits zero but leaves no output behind.
pub const SILENT_SCRIPT: &str = r#"touch "$BC_MARKER"; exit 0"#;

/// Multipart boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "beatscoin-test-boundary";

/// Test harness wrapping an [`AppContext`] with a scripted encoder.
pub struct TestHarness {
    pub ctx: AppContext,
    root: TempDir,
}

impl TestHarness {
    /// Harness whose encoder prefixes the upload with `OPUS`.
    pub fn new() -> Self {
        Self::with_script(PREFIX_SCRIPT)
    }

    /// Harness running `script` as the encoder.
    pub fn with_script(script: &str) -> Self {
        Self::with_config(script, |_| {})
    }

    /// Harness running `script`, with further config tweaks applied.
    pub fn with_config(script: &str, tweak: impl FnOnce(&mut Config)) -> Self {
        let root = tempfile::tempdir().expect("failed to create temp dir");
        let scratch = root.path().join("scratch");
        std::fs::create_dir_all(&scratch).expect("failed to create scratch dir");

        let mut config = Config::default();
        config.server.scratch_dir = Some(scratch);
        config.encoder.program = "sh".into();
        config.encoder.args = vec!["-c".into(), script.into()];
        config.encoder.env.insert(
            "BC_MARKER".into(),
            root.path().join("encoder-ran").to_string_lossy().to_string(),
        );
        config.encoder.timeout_secs = 10;
        tweak(&mut config);

        let ctx = AppContext::new(config);
        Self { ctx, root }
    }

    /// The application router, ready for `oneshot`.
    pub fn router(&self) -> Router {
        build_router(self.ctx.clone(), None)
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server(script: &str) -> (Self, SocketAddr) {
        let harness = Self::with_script(script);
        let app = harness.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    /// Root of the harness temp dir, for tests that need somewhere to write.
    pub fn dir(&self) -> &Path {
        self.root.path()
    }

    /// Files currently sitting in the scratch directory.
    pub fn scratch_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.ctx.scratch_dir)
            .expect("failed to read scratch dir")
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect()
    }

    /// Poll until the scratch directory is empty (response bodies are dropped
    /// asynchronously after the last byte is sent).
    pub async fn wait_for_empty_scratch(&self) -> Vec<PathBuf> {
        for _ in 0..50 {
            let files = self.scratch_files();
            if files.is_empty() {
                return files;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        self.scratch_files()
    }

    /// Whether the encoder script has run at least once.
    pub fn encoder_ran(&self) -> bool {
        self.root.path().join("encoder-ran").exists()
    }
}

/// One part of a hand-built multipart body.
pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: &'a [u8],
}

impl<'a> Part<'a> {
    /// A `file` part as a browser would send it.
    pub fn file(file_name: &'a str, data: &'a [u8]) -> Self {
        Self {
            name: "file",
            file_name: Some(file_name),
            content_type: Some("audio/mpeg"),
            data,
        }
    }

    /// A plain text field.
    pub fn text(name: &'a str, data: &'a [u8]) -> Self {
        Self {
            name,
            file_name: None,
            content_type: None,
            data,
        }
    }
}

/// Encode `parts` as `multipart/form-data` using [`BOUNDARY`].
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(file_name) = part.file_name {
            disposition.push_str(&format!("; filename=\"{file_name}\""));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(ct) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// `Content-Type` header value matching [`multipart_body`].
pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}
