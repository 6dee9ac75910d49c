use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("no validation available for {0}")]
    NoValidation(String),
}

impl SyncError {
    /// Worth another attempt: transport trouble, timeouts, 429 and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            #[cfg(feature = "http")]
            Self::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Self::Server { status, .. } => *status == 429 || *status >= 500,
            Self::Timeout(_) => true,
            Self::Json(_) | Self::Io { .. } | Self::NoValidation(_) => false,
        }
    }
}
