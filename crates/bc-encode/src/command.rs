//! Runs the external encoder with timeout support.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use bc_core::config::EncoderConfig;
use tokio::process::Command;

/// Output captured from an encoder run.
#[derive(Debug, Clone)]
pub struct EncoderOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// The command-line contract of the external encoder.
///
/// The encoder is invoked as `<program> [args...] <input> <output>` and
/// signals success with exit code zero. Nothing else about it is assumed.
///
/// # Example
///
/// ```no_run
/// use bc_encode::EncoderCommand;
/// use std::path::Path;
///
/// # async fn example() -> bc_core::Result<()> {
/// EncoderCommand::new("python3")
///     .arg("scripts/opusprov4.py")
///     .env("PYTHONIOENCODING", "utf-8")
///     .execute(Path::new("/tmp/in.mp3"), Path::new("/tmp/out.opus"))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EncoderCommand {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    timeout: Duration,
}

impl EncoderCommand {
    /// Create a command for the given program with the default timeout.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            timeout: EncoderConfig::default().timeout(),
        }
    }

    /// Build the command described by the `encoder` config section.
    pub fn from_config(config: &EncoderConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            env: config.env.clone(),
            timeout: config.timeout(),
        }
    }

    /// Append a leading argument (placed before the input/output paths).
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Set an environment variable for the encoder process.
    pub fn env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The configured program name or path.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the encoder on `input`, writing to `output`.
    ///
    /// # Errors
    ///
    /// Returns [`bc_core::Error::Encoder`] if the process cannot be spawned,
    /// exits non-zero, exceeds the timeout (the process is killed), or exits
    /// zero without leaving a non-empty file at `output`.
    pub async fn execute(&self, input: &Path, output: &Path) -> bc_core::Result<EncoderOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(input)
            .arg(output)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            program = %self.program,
            input = %input.display(),
            output = %output.display(),
            "Spawning encoder"
        );

        let child = cmd
            .spawn()
            .map_err(|e| bc_core::Error::encoder(format!("{}: failed to spawn: {e}", self.program)))?;

        // Dropping the future on timeout drops the child, which kills it.
        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;

        let output_data = match result {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => {
                return Err(bc_core::Error::encoder(format!(
                    "{}: I/O error waiting for process: {e}",
                    self.program
                )))
            }
            Err(_elapsed) => {
                return Err(bc_core::Error::encoder(format!(
                    "{}: timed out after {:?}",
                    self.program, self.timeout
                )))
            }
        };

        let encoder_output = EncoderOutput {
            status: output_data.status,
            stdout: String::from_utf8_lossy(&output_data.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output_data.stderr).to_string(),
        };

        if !encoder_output.status.success() {
            return Err(bc_core::Error::encoder(format!(
                "{}: exited with status {}: {}",
                self.program,
                encoder_output.status,
                tail(&encoder_output.stderr, 20)
            )));
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(encoder_output),
            Ok(_) => Err(bc_core::Error::encoder(format!(
                "{}: exited successfully but {} is empty",
                self.program,
                output.display()
            ))),
            Err(e) => Err(bc_core::Error::encoder(format!(
                "{}: exited successfully but {} is unreadable: {e}",
                self.program,
                output.display()
            ))),
        }
    }
}

/// Last `n` lines of `text`, trimmed.
fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
