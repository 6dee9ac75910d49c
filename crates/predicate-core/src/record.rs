//! Score breakdowns, risk flags, decisions and roles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One scoring rule's contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub name: String,
    pub points: u32,
    pub max: u32,
    /// The rule that produced `points`, in words.
    pub rule: String,
}

impl ScoreComponent {
    pub fn new(name: &str, points: u32, max: u32, rule: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            points,
            max,
            rule: rule.into(),
        }
    }
}

/// The five base components (0..=100).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub section_context: ScoreComponent,
    pub citation_frequency: ScoreComponent,
    pub product_code: ScoreComponent,
    pub recency: ScoreComponent,
    pub regulatory_history: ScoreComponent,
    pub total: u32,
}

impl ScoreBreakdown {
    pub fn components(&self) -> [&ScoreComponent; 5] {
        [
            &self.section_context,
            &self.citation_frequency,
            &self.product_code,
            &self.recency,
            &self.regulatory_history,
        ]
    }
}

/// The four tie-break components (0..=20).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusBreakdown {
    pub chain_depth: ScoreComponent,
    pub se_table: ScoreComponent,
    pub applicant_similarity: ScoreComponent,
    pub ifu_overlap: ScoreComponent,
    pub total: u32,
}

impl BonusBreakdown {
    pub fn components(&self) -> [&ScoreComponent; 4] {
        [
            &self.chain_depth,
            &self.se_table,
            &self.applicant_similarity,
            &self.ifu_overlap,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
    /// Raised by an explicit user action rather than data.
    User,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
            Self::User => "USER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagKind {
    Recalled,
    RecalledClassI,
    PmaOnly,
    ClassIii,
    WebValidationRed,
    WebValidationYellow,
    FdaCriteriaNonCompliant,
    Old,
    HighMaude,
    DeathEvents,
    HistoryUnknown,
    Excluded,
    StatementOnly,
    Supplement,
    DenDevice,
    DenNoPredicates,
    EnrichmentIncomplete,
}

impl FlagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recalled => "RECALLED",
            Self::RecalledClassI => "RECALLED_CLASS_I",
            Self::PmaOnly => "PMA_ONLY",
            Self::ClassIii => "CLASS_III",
            Self::WebValidationRed => "WEB_VALIDATION_RED",
            Self::WebValidationYellow => "WEB_VALIDATION_YELLOW",
            Self::FdaCriteriaNonCompliant => "FDA_CRITERIA_NON_COMPLIANT",
            Self::Old => "OLD",
            Self::HighMaude => "HIGH_MAUDE",
            Self::DeathEvents => "DEATH_EVENTS",
            Self::HistoryUnknown => "HISTORY_UNKNOWN",
            Self::Excluded => "EXCLUDED",
            Self::StatementOnly => "STATEMENT_ONLY",
            Self::Supplement => "SUPPLEMENT",
            Self::DenDevice => "DEN_DEVICE",
            Self::DenNoPredicates => "DEN_NO_PREDICATES",
            Self::EnrichmentIncomplete => "ENRICHMENT_INCOMPLETE",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::RecalledClassI | Self::WebValidationRed | Self::FdaCriteriaNonCompliant => {
                Severity::Critical
            }
            Self::ClassIii | Self::HighMaude | Self::DeathEvents => Severity::High,
            Self::Recalled
            | Self::PmaOnly
            | Self::WebValidationYellow
            | Self::HistoryUnknown
            | Self::EnrichmentIncomplete => Severity::Medium,
            Self::Old | Self::StatementOnly => Severity::Low,
            Self::Supplement | Self::DenDevice | Self::DenNoPredicates => Severity::Info,
            Self::Excluded => Severity::User,
        }
    }
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFlag {
    pub kind: FlagKind,
    pub severity: Severity,
    /// Which signal raised the flag (`recalls`, `web_validation`, ...).
    pub source: String,
    pub rationale: String,
}

impl RiskFlag {
    pub fn new(kind: FlagKind, source: &str, rationale: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            source: source.to_string(),
            rationale: rationale.into(),
        }
    }
}

/// Decision engine states. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Pending,
    Accept,
    Defer,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accept => "ACCEPT",
            Self::Defer => "DEFER",
            Self::Reject => "REJECT",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Rank for ordering candidates: accepted first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Accept => 0,
            Self::Defer => 1,
            Self::Reject => 2,
            Self::Pending => 3,
        }
    }
}

/// The rule that moved a device out of `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    UserExclusion,
    PreValidationRejection,
    ScoreAccept,
    ScoreDefer,
    ScoreReject,
    IncompleteEnrichment,
}

impl DecisionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserExclusion => "user exclusion",
            Self::PreValidationRejection => "pre-validation rejection",
            Self::ScoreAccept => "score at or above accept threshold",
            Self::ScoreDefer => "score in defer band",
            Self::ScoreReject => "score below defer floor",
            Self::IncompleteEnrichment => "incomplete enrichment",
        }
    }
}

impl fmt::Display for DecisionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Predicate,
    Reference,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Predicate => "predicate",
            Self::Reference => "reference",
        }
    }
}

/// Result of role reclassification for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChange {
    /// `None` for a device first seen in this review.
    pub from: Option<Role>,
    pub to: Role,
    pub reason: String,
}

impl RoleChange {
    pub fn changed(&self) -> bool {
        self.from != Some(self.to)
    }
}
