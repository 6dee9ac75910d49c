use std::path::PathBuf;

use predicate_core::ReviewError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{path} is corrupt: {detail}")]
    Corrupt { path: PathBuf, detail: String },

    #[error("exclusion for {device_id} changed since snapshot v{snapshot} (store is at v{current})")]
    VersionConflict {
        device_id: String,
        snapshot: u64,
        current: u64,
    },

    #[error("{device_id} is not excluded")]
    NotExcluded { device_id: String },

    #[error("timed out waiting for lock {0}")]
    Locked(PathBuf),

    #[error("audit chain broken at seq {seq}: {detail}")]
    ChainBroken { seq: u64, detail: String },

    #[error("no results for query")]
    NoResults,

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The review-level error this maps to, if it ends the session.
    pub fn as_review_error(&self) -> Option<ReviewError> {
        match self {
            Self::Corrupt { path, detail } => Some(ReviewError::ExclusionStoreCorrupt(format!(
                "{}: {detail}",
                path.display()
            ))),
            _ => None,
        }
    }
}
