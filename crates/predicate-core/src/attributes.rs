//! Facts supplied by the external registries for a device identifier.
//!
//! Every field is optional: an absent value means "unknown" and each scoring
//! rule documents its own default for that case.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecallClass {
    #[serde(rename = "I")]
    ClassI,
    #[serde(rename = "II")]
    ClassII,
    #[serde(rename = "III")]
    ClassIII,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallRecord {
    pub class: RecallClass,
    #[serde(default)]
    pub recall_number: Option<String>,
    #[serde(default)]
    pub initiated: Option<NaiveDate>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// FDA device classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceClass {
    #[serde(rename = "1")]
    I,
    #[serde(rename = "2")]
    II,
    #[serde(rename = "3")]
    III,
}

/// How much of a substantial-equivalence comparison table the predicate's
/// own summary carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeTableDetail {
    Detailed,
    Minimal,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketStatus {
    Marketed,
    Withdrawn,
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceAttributes {
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default)]
    pub review_panel: Option<String>,
    #[serde(default)]
    pub decision_date: Option<NaiveDate>,
    #[serde(default)]
    pub device_class: Option<DeviceClass>,
    /// Cleared only through the PMA pathway.
    #[serde(default)]
    pub pma_only: bool,
    /// `None` means the recall database was not consulted.
    #[serde(default)]
    pub recalls: Option<Vec<RecallRecord>>,
    #[serde(default)]
    pub adverse_event_count: Option<u32>,
    #[serde(default)]
    pub death_event_count: Option<u32>,
    #[serde(default)]
    pub market_status: Option<MarketStatus>,
    #[serde(default)]
    pub applicant: Option<String>,
    #[serde(default)]
    pub applicant_parent: Option<String>,
    /// Generations of predicate-of-predicate lineage.
    #[serde(default)]
    pub chain_depth: Option<u32>,
    #[serde(default)]
    pub se_table: Option<SeTableDetail>,
    /// Cleared indications-for-use text.
    #[serde(default)]
    pub cleared_indication: Option<String>,
    /// Only a 510(k) Statement (no Summary) is on file.
    #[serde(default)]
    pub statement_only: bool,
}

impl DeviceAttributes {
    pub fn has_class_i_recall(&self) -> bool {
        self.recalls
            .as_ref()
            .is_some_and(|r| r.iter().any(|rec| rec.class == RecallClass::ClassI))
    }

    /// Any Class II or Class III recall.
    pub fn has_lesser_recall(&self) -> bool {
        self.recalls
            .as_ref()
            .is_some_and(|r| r.iter().any(|rec| rec.class != RecallClass::ClassI))
    }
}

/// Outcome of an attribute lookup after retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttributeLookup {
    Found { attributes: DeviceAttributes },
    /// The registry answered but has no record for the identifier.
    NotFound,
    /// Transport failure, timeout, or cancellation.
    Failed { reason: String },
}

impl AttributeLookup {
    pub fn attributes(&self) -> Option<&DeviceAttributes> {
        match self {
            Self::Found { attributes } => Some(attributes),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Found { .. } => "found".to_string(),
            Self::NotFound => "no registry record".to_string(),
            Self::Failed { reason } => format!("lookup failed: {reason}"),
        }
    }
}

/// Live market / enforcement status from upstream web validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebFlag {
    Green,
    Yellow,
    Red,
}

impl WebFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "GREEN",
            Self::Yellow => "YELLOW",
            Self::Red => "RED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebValidation {
    pub flag: WebFlag,
    #[serde(default)]
    pub rationale: String,
}

/// One regulatory criterion that the upstream compliance check evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: String,
    pub description: String,
    /// Governing citation, e.g. `510(k) Program Guidance §IV.B`.
    #[serde(default)]
    pub citation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub compliant: bool,
    #[serde(default)]
    pub failed_criteria: Vec<Criterion>,
}

/// Combined upstream validation for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub web: WebValidation,
    pub compliance: ComplianceResult,
}

/// What enrichment produced for one device: the attribute lookup and, when
/// the validator answered, its report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub attributes: AttributeLookup,
    #[serde(default)]
    pub validation: Option<ValidationReport>,
    /// Why validation is missing, when it is.
    #[serde(default)]
    pub validation_error: Option<String>,
}

impl Enrichment {
    /// Placeholder for a device enrichment never reached.
    pub fn unavailable(reason: &str) -> Self {
        Self {
            attributes: AttributeLookup::Failed {
                reason: reason.to_string(),
            },
            validation: None,
            validation_error: Some(reason.to_string()),
        }
    }

    /// Attribute lookup failed or the validator never answered.
    pub fn is_incomplete(&self) -> bool {
        matches!(self.attributes, AttributeLookup::Failed { .. }) || self.validation.is_none()
    }
}

/// The user's own (subject) device, against which relatedness is judged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectDevice {
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default)]
    pub review_panel: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub parent_company: Option<String>,
    /// Proposed indications-for-use text.
    #[serde(default)]
    pub indication: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recall_queries() {
        let mut attrs = DeviceAttributes::default();
        assert!(!attrs.has_class_i_recall());
        assert!(!attrs.has_lesser_recall());

        attrs.recalls = Some(vec![RecallRecord {
            class: RecallClass::ClassII,
            recall_number: Some("Z-1234-2020".into()),
            initiated: None,
            reason: None,
        }]);
        assert!(!attrs.has_class_i_recall());
        assert!(attrs.has_lesser_recall());
    }

    #[test]
    fn not_found_lookup_with_validation_is_complete() {
        let enrichment = Enrichment {
            attributes: AttributeLookup::NotFound,
            validation: Some(ValidationReport {
                web: WebValidation {
                    flag: WebFlag::Green,
                    rationale: String::new(),
                },
                compliance: ComplianceResult {
                    compliant: true,
                    failed_criteria: vec![],
                },
            }),
            validation_error: None,
        };
        assert!(!enrichment.is_incomplete());
        assert!(Enrichment::unavailable("cancelled").is_incomplete());
    }

    #[test]
    fn lookup_json_is_tagged() {
        let json = serde_json::to_value(AttributeLookup::NotFound).unwrap();
        assert_eq!(json["status"], "not_found");

        let parsed: AttributeLookup = serde_json::from_str(
            r#"{"status": "found", "attributes": {"product_code": "QAS", "recalls": []}}"#,
        )
        .unwrap();
        let attrs = parsed.attributes().unwrap();
        assert_eq!(attrs.product_code.as_deref(), Some("QAS"));
        assert_eq!(attrs.recalls.as_ref().map(Vec::len), Some(0));
    }

    #[test]
    fn validation_report_parses_upstream_shape() {
        let report: ValidationReport = serde_json::from_str(
            r#"{
                "web": {"flag": "YELLOW", "rationale": "recent field correction"},
                "compliance": {"compliant": true, "failed_criteria": []}
            }"#,
        )
        .unwrap();
        assert_eq!(report.web.flag, WebFlag::Yellow);
        assert!(report.compliance.compliant);
    }
}
