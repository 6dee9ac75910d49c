pub mod attributes;
pub mod audit;
pub mod citation;
pub mod config;
pub mod device_id;
pub mod error;
pub mod exclusion;
pub mod mention;
pub mod record;
pub mod schema;

pub use attributes::{
    AttributeLookup, ComplianceResult, Criterion, DeviceAttributes, DeviceClass, Enrichment, MarketStatus,
    RecallClass, RecallRecord, SeTableDetail, SubjectDevice, ValidationReport, WebFlag,
    WebValidation,
};
pub use audit::{AuditRecord, ChecklistItem};
pub use citation::{CitationSummary, DocumentCitation, NON_SE_DOCUMENT_WEIGHT, SE_DOCUMENT_WEIGHT};
pub use config::{ConfigError, ReviewConfig};
pub use device_id::{DeviceId, SubmissionKind};
pub use error::{ReviewError, ReviewIssue};
pub use exclusion::{ExclusionEntry, ExclusionOrigin, ExclusionSnapshot};
pub use mention::{
    DeviceMention, DocumentType, RawMention, SectionCategory, SectionMatch, SectionTier,
    SourceDocument,
};
pub use record::{
    BonusBreakdown, Decision, DecisionRule, FlagKind, RiskFlag, Role, RoleChange, ScoreBreakdown,
    ScoreComponent, Severity,
};
pub use schema::review;
