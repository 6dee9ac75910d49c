//! Raw and classified device mentions, and the documents they come from.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::DeviceId;

/// Canonical section context of a mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectionCategory {
    /// Substantial-equivalence / predicate-comparison section.
    #[serde(rename = "SE")]
    Se,
    /// Testing or clinical header area, not a formal SE section.
    Mixed,
    /// Body text only.
    General,
    /// Recovered via OCR inside a table or figure.
    TableOrImage,
}

impl SectionCategory {
    pub const ALL: [SectionCategory; 4] = [
        SectionCategory::Se,
        SectionCategory::Mixed,
        SectionCategory::General,
        SectionCategory::TableOrImage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Se => "SE",
            Self::Mixed => "Mixed",
            Self::General => "General",
            Self::TableOrImage => "TableOrImage",
        }
    }

    /// Section-context points this category earns on its own.
    ///
    /// Ordering by weight is also the conservativeness order used to break
    /// ties: the lowest weight wins an ambiguous classification.
    pub fn weight(&self) -> u32 {
        match self {
            Self::Se => 40,
            Self::Mixed => 25,
            Self::TableOrImage => 15,
            Self::General => 10,
        }
    }

    /// Pick the most conservative of a set of candidates.
    pub fn most_conservative(candidates: impl IntoIterator<Item = SectionCategory>) -> Option<Self> {
        candidates.into_iter().min_by_key(|c| c.weight())
    }
}

/// Which classifier tier produced a section match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectionTier {
    Regex = 1,
    OcrTolerant = 2,
    Semantic = 3,
}

impl SectionTier {
    pub fn number(&self) -> u8 {
        *self as u8
    }
}

/// Outcome of section classification for one mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionMatch {
    pub category: SectionCategory,
    /// `None` when every tier failed.
    pub tier: Option<SectionTier>,
    pub low_confidence_section: bool,
    /// Heading (or strategy label) that decided the category, if any.
    pub evidence: Option<String>,
}

impl SectionMatch {
    /// The fallback when no tier produced a category.
    pub fn unclassified() -> Self {
        Self {
            category: SectionCategory::General,
            tier: None,
            low_confidence_section: true,
            evidence: None,
        }
    }
}

/// One occurrence of a device identifier as produced by upstream extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMention {
    pub device_id: String,
    pub document_id: String,
    /// Character (not byte) offset into the document text.
    pub offset: usize,
    /// Surrounding text window.
    #[serde(default)]
    pub context: String,
    /// True when recovered by OCR inside a table or figure.
    #[serde(default)]
    pub from_table: bool,
}

/// A validated, section-classified mention. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMention {
    pub device_id: DeviceId,
    pub document_id: String,
    pub offset: usize,
    pub context: String,
    pub section: SectionMatch,
}

/// 510(k) documents come either as a full Summary or a short Statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Summary,
    Statement,
}

/// A regulatory document that cites other devices. Read-only reference data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub document_id: String,
    /// The citing device's own identifier.
    #[serde(default)]
    pub device_id: Option<DeviceId>,
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default)]
    pub review_panel: Option<String>,
    pub document_type: DocumentType,
    #[serde(default)]
    pub decision_date: Option<NaiveDate>,
    /// Full extracted text.
    #[serde(default)]
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_is_most_conservative() {
        let pick = SectionCategory::most_conservative(SectionCategory::ALL);
        assert_eq!(pick, Some(SectionCategory::General));
        let pick = SectionCategory::most_conservative([SectionCategory::Se, SectionCategory::Mixed]);
        assert_eq!(pick, Some(SectionCategory::Mixed));
    }

    #[test]
    fn se_serialises_as_upper_case() {
        assert_eq!(serde_json::to_string(&SectionCategory::Se).unwrap(), "\"SE\"");
        assert_eq!(
            serde_json::to_string(&SectionCategory::TableOrImage).unwrap(),
            "\"TableOrImage\""
        );
    }

    #[test]
    fn raw_mention_defaults() {
        let raw: RawMention = serde_json::from_str(
            r#"{"device_id": "K241335", "document_id": "K250001", "offset": 120}"#,
        )
        .unwrap();
        assert!(!raw.from_table);
        assert!(raw.context.is_empty());
    }

    #[test]
    fn tier_numbers() {
        assert_eq!(SectionTier::Regex.number(), 1);
        assert_eq!(SectionTier::OcrTolerant.number(), 2);
        assert_eq!(SectionTier::Semantic.number(), 3);
    }
}
