//! Unified error type for beatscoin.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`].

/// Unified error type covering all failure modes in beatscoin.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request data failed validation (missing file, malformed body, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The upload exceeded the configured size ceiling.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// The token balance cannot cover a conversion.
    #[error("Insufficient tokens: balance {balance}, conversion costs {cost}")]
    InsufficientTokens {
        /// Current balance.
        balance: u64,
        /// Cost of one conversion.
        cost: u64,
    },

    /// The external encoder failed to spawn, exited non-zero, timed out, or
    /// produced no output.
    #[error("Encoder error: {message}")]
    Encoder {
        /// Human-readable error description (logged, never sent to clients).
        message: String,
    },

    /// The conversion server rejected a request.
    #[error("Server returned {status}: {message}")]
    Remote {
        /// HTTP status returned by the server.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The conversion server could not be reached or the response was cut.
    #[error("Request failed: {0}")]
    Transport(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::PayloadTooLarge(_) => 413,
            Error::InsufficientTokens { .. } => 402,
            Error::Encoder { .. } => 500,
            Error::Remote { status, .. } => *status,
            Error::Transport(_) => 502,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Message safe to hand to an HTTP client.
    ///
    /// Client-correctable errors keep their detail; server-side failures are
    /// collapsed to a fixed message.
    pub fn public_message(&self) -> String {
        match self {
            Error::Validation(message) | Error::PayloadTooLarge(message) => message.clone(),
            Error::Encoder { .. } | Error::Io { .. } => "conversion failed".to_string(),
            Error::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Encoder`].
    pub fn encoder(message: impl Into<String>) -> Self {
        Error::Encoder {
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
