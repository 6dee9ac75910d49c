//! The immutable justification record written for every decision.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AttributeLookup, BonusBreakdown, CitationSummary, Criterion, Decision, DecisionRule, DeviceId,
    ReviewIssue, RiskFlag, RoleChange, ScoreBreakdown, ValidationReport,
};

/// One line of the regulatory-criteria checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub criterion: Criterion,
    pub passed: bool,
}

/// Full justification for one device decision in one review pass.
///
/// Records are never edited. A later review of the same device produces a
/// new record; the audit log links it to the one it supersedes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub device_id: DeviceId,
    pub review_date: NaiveDate,
    pub citations: CitationSummary,
    pub attributes: AttributeLookup,
    pub validation: Option<ValidationReport>,
    pub compliance_checklist: Vec<ChecklistItem>,
    /// `None` when the pre-validation rule bypassed scoring.
    pub score: Option<ScoreBreakdown>,
    pub bonus: Option<BonusBreakdown>,
    pub adjusted_score: Option<i64>,
    pub accept_threshold: u32,
    pub flags: Vec<RiskFlag>,
    pub decision: Decision,
    pub rule: DecisionRule,
    pub rationale: String,
    pub governing_citation: Option<String>,
    /// Verbatim record of an exclusion overriding an otherwise-accepted score.
    pub override_note: Option<String>,
    pub role: RoleChange,
    pub issues: Vec<ReviewIssue>,
    /// SHA-256 over every field except `fingerprint` and `created_at`.
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}
