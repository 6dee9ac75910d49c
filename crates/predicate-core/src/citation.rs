//! Aggregated citation evidence for one device identifier.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::SectionCategory;

/// Weight a document contributes when it cites the device in an SE section.
pub const SE_DOCUMENT_WEIGHT: f64 = 1.0;
/// Weight a document contributes when it only cites the device elsewhere.
pub const NON_SE_DOCUMENT_WEIGHT: f64 = 0.5;

/// How one source document cites the device.
///
/// Categories are kept per document and never merged into a combined
/// category: SE in one document and General in another stay two observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentCitation {
    pub document_id: String,
    pub categories: BTreeSet<SectionCategory>,
    pub mention_count: usize,
    pub weight: f64,
}

impl DocumentCitation {
    pub fn has_se(&self) -> bool {
        self.categories.contains(&SectionCategory::Se)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationSummary {
    pub documents: Vec<DocumentCitation>,
    /// Mention counts per category across all documents.
    pub histogram: BTreeMap<SectionCategory, usize>,
    pub unique_source_count: usize,
    pub weighted_citation_score: f64,
    /// Mentions whose section came from the no-tier fallback.
    pub low_confidence_mentions: usize,
}

impl CitationSummary {
    pub fn has_category(&self, category: SectionCategory) -> bool {
        self.histogram.get(&category).is_some_and(|&n| n > 0)
    }

    pub fn total_mentions(&self) -> usize {
        self.histogram.values().sum()
    }
}
