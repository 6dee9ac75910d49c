//! Audit record construction and content fingerprinting.

use chrono::{DateTime, NaiveDate, Utc};
use predicate_core::{
    AttributeLookup, AuditRecord, BonusBreakdown, ChecklistItem, CitationSummary, DeviceId,
    ReviewIssue, RiskFlag, RoleChange, ValidationReport,
};
use sha2::{Digest, Sha256};

use crate::decision::DecisionOutcome;

/// Everything that goes into one audit record apart from its timestamps.
pub struct AuditParts<'a> {
    pub device_id: &'a DeviceId,
    pub review_date: NaiveDate,
    pub citations: &'a CitationSummary,
    pub attributes: &'a AttributeLookup,
    pub validation: Option<&'a ValidationReport>,
    pub checklist: &'a [ChecklistItem],
    pub bonus: Option<&'a BonusBreakdown>,
    pub flags: &'a [RiskFlag],
    pub outcome: &'a DecisionOutcome,
    pub accept_threshold: u32,
    pub role: &'a RoleChange,
    pub issues: &'a [ReviewIssue],
}

pub fn build(parts: AuditParts<'_>, created_at: DateTime<Utc>) -> AuditRecord {
    let mut record = AuditRecord {
        device_id: parts.device_id.clone(),
        review_date: parts.review_date,
        citations: parts.citations.clone(),
        attributes: parts.attributes.clone(),
        validation: parts.validation.cloned(),
        compliance_checklist: parts.checklist.to_vec(),
        score: parts.outcome.score.clone(),
        bonus: parts.bonus.cloned(),
        adjusted_score: parts.outcome.adjusted,
        accept_threshold: parts.accept_threshold,
        flags: parts.flags.to_vec(),
        decision: parts.outcome.decision,
        rule: parts.outcome.rule,
        rationale: parts.outcome.rationale.clone(),
        governing_citation: parts.outcome.governing_citation.clone(),
        override_note: parts.outcome.override_note.clone(),
        role: parts.role.clone(),
        issues: parts.issues.to_vec(),
        fingerprint: String::new(),
        created_at,
    };
    record.fingerprint = fingerprint(&record);
    record
}

/// SHA-256 over the record's JSON with `fingerprint` and `created_at`
/// removed. Object keys serialise sorted, so equal content hashes equally.
pub fn fingerprint(record: &AuditRecord) -> String {
    let mut value = match serde_json::to_value(record) {
        Ok(v) => v,
        Err(err) => {
            tracing::error!(%err, device = %record.device_id, "audit record did not serialise");
            return String::new();
        }
    };
    if let Some(obj) = value.as_object_mut() {
        obj.remove("fingerprint");
        obj.remove("created_at");
    }
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_fingerprint(record: &AuditRecord) -> bool {
    !record.fingerprint.is_empty() && record.fingerprint == fingerprint(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use predicate_core::{Decision, DecisionRule, FlagKind, Role};

    fn outcome() -> DecisionOutcome {
        DecisionOutcome {
            decision: Decision::Defer,
            rule: DecisionRule::ScoreDefer,
            rationale: "adjusted score 65 (75 -10) in defer band [40, 70)".into(),
            score: None,
            adjusted: Some(65),
            governing_citation: None,
            override_note: None,
            conflict: None,
        }
    }

    fn record_at(hour: u32) -> AuditRecord {
        let id = DeviceId::parse("K200222").unwrap();
        let flags = vec![RiskFlag::new(FlagKind::WebValidationYellow, "web_validation", "yellow")];
        let role = RoleChange {
            from: Some(Role::Reference),
            to: Role::Predicate,
            reason: "cited in SE context".into(),
        };
        build(
            AuditParts {
                device_id: &id,
                review_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                citations: &CitationSummary::default(),
                attributes: &AttributeLookup::NotFound,
                validation: None,
                checklist: &[],
                bonus: None,
                flags: &flags,
                outcome: &outcome(),
                accept_threshold: 70,
                role: &role,
                issues: &[],
            },
            Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap(),
        )
    }

    #[test]
    fn fingerprint_ignores_creation_time() {
        let a = record_at(9);
        let b = record_at(17);
        assert_ne!(a.created_at, b.created_at);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.fingerprint.len(), 64);
        assert!(verify_fingerprint(&a));
    }

    fn changes_fingerprint(edit: impl FnOnce(&mut AuditRecord)) -> bool {
        let base = record_at(9);
        let mut changed = base.clone();
        edit(&mut changed);
        fingerprint(&changed) != base.fingerprint
    }

    #[test]
    fn fingerprint_tracks_every_input() {
        assert!(changes_fingerprint(|r| r.device_id = DeviceId::parse("K200223").unwrap()));
        assert!(changes_fingerprint(|r| {
            r.review_date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
        }));
        assert!(changes_fingerprint(|r| r.citations.unique_source_count = 1));
        assert!(changes_fingerprint(|r| {
            r.attributes = AttributeLookup::Failed {
                reason: "timeout".into(),
            }
        }));
        assert!(changes_fingerprint(|r| r.adjusted_score = Some(66)));
        assert!(changes_fingerprint(|r| r.accept_threshold = 75));
        assert!(changes_fingerprint(|r| r.flags.clear()));
        assert!(changes_fingerprint(|r| r.decision = Decision::Reject));
        assert!(changes_fingerprint(|r| r.rule = DecisionRule::ScoreReject));
        assert!(changes_fingerprint(|r| r.rationale.push('.')));
        assert!(changes_fingerprint(|r| {
            r.governing_citation = Some("21 CFR 807.92".into())
        }));
        assert!(changes_fingerprint(|r| r.override_note = Some("manual".into())));
        assert!(changes_fingerprint(|r| r.role.to = Role::Reference));
        assert!(changes_fingerprint(|r| {
            r.issues.push(ReviewIssue {
                code: "enrichment_unavailable".into(),
                message: "lookup failed".into(),
            })
        }));
    }

    #[test]
    fn tampered_record_fails_verification() {
        let mut record = record_at(9);
        record.adjusted_score = Some(90);
        assert!(!verify_fingerprint(&record));

        let mut unsigned = record_at(9);
        unsigned.fingerprint.clear();
        assert!(!verify_fingerprint(&unsigned));
    }
}
