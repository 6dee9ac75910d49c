use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Review-level error taxonomy.
///
/// Only [`ExclusionStoreCorrupt`](Self::ExclusionStoreCorrupt) aborts a review
/// session. The rest degrade a single signal and are recorded as
/// [`ReviewIssue`]s on the affected device.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("malformed device identifier: {0:?}")]
    MalformedDeviceId(String),

    #[error("ambiguous section context for {device_id} in {document_id}: {detail}")]
    SectionClassificationAmbiguous {
        device_id: String,
        document_id: String,
        detail: String,
    },

    #[error("enrichment unavailable for {device_id}: {reason}")]
    EnrichmentUnavailable { device_id: String, reason: String },

    #[error("exclusion store corrupt: {0}")]
    ExclusionStoreCorrupt(String),

    #[error("score out of range: {component} = {value} (allowed 0..={max})")]
    ScoreOutOfRange {
        component: String,
        value: i64,
        max: u32,
    },

    #[error("decision conflict for {device_id}: {detail}")]
    DecisionConflict { device_id: String, detail: String },
}

impl ReviewError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedDeviceId(_) => "malformed_device_id",
            Self::SectionClassificationAmbiguous { .. } => "section_classification_ambiguous",
            Self::EnrichmentUnavailable { .. } => "enrichment_unavailable",
            Self::ExclusionStoreCorrupt(_) => "exclusion_store_corrupt",
            Self::ScoreOutOfRange { .. } => "score_out_of_range",
            Self::DecisionConflict { .. } => "decision_conflict",
        }
    }

    /// True when the review session cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ExclusionStoreCorrupt(_))
    }
}

/// A non-fatal problem recorded alongside a review result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewIssue {
    pub code: String,
    pub message: String,
}

impl From<&ReviewError> for ReviewIssue {
    fn from(err: &ReviewError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}
