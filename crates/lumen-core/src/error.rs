//! Domain-specific errors for update operations.
//!
//! One taxonomy for the whole pipeline; stages either return these or, for
//! expected per-run conditions (unsupported platform, missing runtime
//! variant), report and return `Ok(false)` instead of raising.

use thiserror::Error;

/// Failure kinds surfaced by the update pipeline.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Network unreachable or non-2xx response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Post-download digest did not match the manifest.
    #[error("hash mismatch: expected {expected}, got {actual}")]
    Integrity {
        /// Digest the manifest required.
        expected: String,
        /// Digest the downloaded bytes produced.
        actual: String,
    },

    /// Permission, missing path, disk full.
    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    /// Malformed index line, unparseable archive or JSON document,
    /// missing expected folder inside an extracted runtime.
    #[error("format error: {0}")]
    Format(String),

    /// No runtime variant published for the host platform.
    #[error("no runtime variant for platform {0}")]
    UnsupportedPlatform(String),
}

impl UpdateError {
    /// True for errors worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<serde_json::Error> for UpdateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(err.to_string())
    }
}
