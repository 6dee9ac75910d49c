//! Composition of the review stages into per-device records.
//!
//! Classification and evaluation are split so that the caller can run the
//! asynchronous enrichment for the classified identifiers in between.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use predicate_classify::{DeviceCitations, SectionClassifier, aggregate};
use predicate_core::{
    AttributeLookup, AuditRecord, BonusBreakdown, CitationSummary, Decision, DeviceId,
    DeviceMention, Enrichment, ExclusionSnapshot, RawMention, ReviewConfig, ReviewError,
    ReviewIssue, RiskFlag, Role, RoleChange, ScoreBreakdown, SourceDocument, SubjectDevice,
    ValidationReport,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::{self, AuditParts};
use crate::bonus;
use crate::decision::{self, DecisionInput};
use crate::flags::{self, FlagInput};
use crate::reclassify::reclassify;
use crate::score::{self, Relatedness, ScoreInput};
use crate::validator;

/// Output of the classification stage.
#[derive(Debug, Default)]
pub struct Classification {
    pub devices: BTreeMap<DeviceId, DeviceCitations>,
    /// Issues raised while classifying; keyed by device when one is known.
    pub issues: Vec<(Option<String>, ReviewIssue)>,
}

impl Classification {
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.keys().cloned().collect()
    }

    pub fn mention_count(&self) -> usize {
        self.devices.values().map(|d| d.mentions.len()).sum()
    }
}

/// Session-wide inputs to evaluation.
pub struct ReviewContext<'a> {
    pub documents: &'a [SourceDocument],
    pub subject: &'a SubjectDevice,
    pub prior_roles: &'a BTreeMap<DeviceId, Role>,
    pub exclusions: &'a ExclusionSnapshot,
    pub enrichment: &'a BTreeMap<DeviceId, Enrichment>,
    pub review_date: NaiveDate,
}

/// Everything known and decided about one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: DeviceId,
    pub mentions: Vec<DeviceMention>,
    pub citations: CitationSummary,
    pub attributes: AttributeLookup,
    pub validation: Option<ValidationReport>,
    pub score: Option<ScoreBreakdown>,
    pub adjusted_score: Option<i64>,
    pub bonus: Option<BonusBreakdown>,
    pub flags: Vec<RiskFlag>,
    pub decision: Decision,
    pub role: RoleChange,
    pub audit: AuditRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewReport {
    pub review_date: NaiveDate,
    pub exclusion_version: u64,
    /// Ordered by decision tier, then adjusted score, then bonus.
    pub records: Vec<DeviceRecord>,
    /// Issues not attributable to a single device.
    pub issues: Vec<ReviewIssue>,
}

impl ReviewReport {
    pub fn count(&self, decision: Decision) -> usize {
        self.records.iter().filter(|r| r.decision == decision).count()
    }

    pub fn record(&self, id: &DeviceId) -> Option<&DeviceRecord> {
        self.records.iter().find(|r| &r.device_id == id)
    }
}

pub struct Reviewer {
    config: ReviewConfig,
    classifier: SectionClassifier,
}

impl Reviewer {
    pub fn new(config: ReviewConfig) -> Self {
        let classifier = SectionClassifier::new(&config);
        Self { config, classifier }
    }

    pub fn with_classifier(config: ReviewConfig, classifier: SectionClassifier) -> Self {
        Self { config, classifier }
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Validate, classify and group raw mentions by device.
    pub fn classify(&self, raws: &[RawMention], documents: &[SourceDocument]) -> Classification {
        let outcome = self.classifier.classify_mentions(raws, documents);
        let devices = aggregate(outcome.mentions);
        info!(
            raw = raws.len(),
            devices = devices.len(),
            issues = outcome.issues.len(),
            "classified mentions"
        );
        Classification {
            devices,
            issues: outcome.issues,
        }
    }

    /// Score, flag, decide and audit every classified device.
    pub fn evaluate(
        &self,
        classification: Classification,
        ctx: &ReviewContext<'_>,
        created_at: DateTime<Utc>,
    ) -> ReviewReport {
        let documents: HashMap<&str, &SourceDocument> = ctx
            .documents
            .iter()
            .map(|d| (d.document_id.as_str(), d))
            .collect();

        let mut session_issues = Vec::new();
        let mut per_device: HashMap<String, Vec<ReviewIssue>> = HashMap::new();
        for (device, issue) in classification.issues {
            match device {
                Some(id) => per_device.entry(id).or_default().push(issue),
                None => session_issues.push(issue),
            }
        }

        let mut records: Vec<DeviceRecord> = classification
            .devices
            .into_iter()
            .map(|(id, cited)| {
                let issues = per_device.remove(id.as_str()).unwrap_or_default();
                self.review_device(id, cited, issues, &documents, ctx, created_at)
            })
            .collect();

        records.sort_by_key(|r| {
            (
                r.decision.rank(),
                Reverse(r.adjusted_score.unwrap_or(i64::MIN)),
                Reverse(r.bonus.as_ref().map_or(0, |b| b.total)),
                r.device_id.clone(),
            )
        });

        info!(
            devices = records.len(),
            accepted = records.iter().filter(|r| r.decision == Decision::Accept).count(),
            deferred = records.iter().filter(|r| r.decision == Decision::Defer).count(),
            rejected = records.iter().filter(|r| r.decision == Decision::Reject).count(),
            "review complete"
        );

        ReviewReport {
            review_date: ctx.review_date,
            exclusion_version: ctx.exclusions.version,
            records,
            issues: session_issues,
        }
    }

    /// Classify and evaluate in one call, for callers with enrichment at hand.
    pub fn review(
        &self,
        raws: &[RawMention],
        ctx: &ReviewContext<'_>,
        created_at: DateTime<Utc>,
    ) -> ReviewReport {
        let classification = self.classify(raws, ctx.documents);
        self.evaluate(classification, ctx, created_at)
    }

    fn review_device(
        &self,
        id: DeviceId,
        cited: DeviceCitations,
        mut issues: Vec<ReviewIssue>,
        documents: &HashMap<&str, &SourceDocument>,
        ctx: &ReviewContext<'_>,
        created_at: DateTime<Utc>,
    ) -> DeviceRecord {
        let config = &self.config;
        let enrichment = ctx
            .enrichment
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Enrichment::unavailable("not enriched"));

        let incomplete = incomplete_reason(&enrichment);
        if let Some(reason) = &incomplete {
            let err = ReviewError::EnrichmentUnavailable {
                device_id: id.to_string(),
                reason: reason.clone(),
            };
            warn!(device = %id, %reason, "enrichment incomplete, using defaults");
            issues.push(ReviewIssue::from(&err));
        }

        let validator = validator::adapt(enrichment.validation.as_ref(), config.yellow_penalty);
        let exclusion = ctx.exclusions.get(&id);

        let flags = flags::assess(&FlagInput {
            device_id: &id,
            lookup: &enrichment.attributes,
            validator: &validator,
            incomplete: incomplete.as_deref(),
            exclusion,
            review_date: ctx.review_date,
            config,
        });

        let mut related = Relatedness::default();
        related.add(ctx.subject.product_code.as_deref(), ctx.subject.review_panel.as_deref());
        for doc in &cited.summary.documents {
            if let Some(source) = documents.get(doc.document_id.as_str()) {
                related.add(source.product_code.as_deref(), source.review_panel.as_deref());
            }
        }

        let mut score_issues = Vec::new();
        let outcome = decision::decide(
            &DecisionInput {
                device_id: &id,
                exclusion,
                validator: &validator,
                enrichment_incomplete: incomplete.is_some(),
                config,
            },
            || {
                let (breakdown, errs) = score::score(&ScoreInput {
                    citations: &cited.summary,
                    lookup: &enrichment.attributes,
                    related: &related,
                    review_date: ctx.review_date,
                    config,
                });
                score_issues = errs;
                breakdown
            },
        );
        issues.extend(score_issues.iter().map(ReviewIssue::from));
        if let Some(conflict) = &outcome.conflict {
            issues.push(ReviewIssue::from(conflict));
        }

        let bonus = outcome
            .score
            .as_ref()
            .map(|_| bonus::bonus(&id, ctx.subject, enrichment.attributes.attributes()));

        let role = reclassify(&id, ctx.prior_roles.get(&id).copied(), &cited.summary);

        let record = audit::build(
            AuditParts {
                device_id: &id,
                review_date: ctx.review_date,
                citations: &cited.summary,
                attributes: &enrichment.attributes,
                validation: enrichment.validation.as_ref(),
                checklist: &validator.checklist,
                bonus: bonus.as_ref(),
                flags: &flags,
                outcome: &outcome,
                accept_threshold: config.accept_threshold,
                role: &role,
                issues: &issues,
            },
            created_at,
        );

        info!(
            device = %id,
            decision = outcome.decision.as_str(),
            rule = outcome.rule.as_str(),
            adjusted = ?outcome.adjusted,
            "decided"
        );

        DeviceRecord {
            device_id: id,
            mentions: cited.mentions,
            citations: cited.summary,
            attributes: enrichment.attributes,
            validation: enrichment.validation,
            score: outcome.score,
            adjusted_score: outcome.adjusted,
            bonus,
            flags,
            decision: outcome.decision,
            role,
            audit: record,
        }
    }
}

fn incomplete_reason(enrichment: &Enrichment) -> Option<String> {
    let mut reasons = Vec::new();
    if let AttributeLookup::Failed { reason } = &enrichment.attributes {
        reasons.push(format!("attribute lookup failed: {reason}"));
    }
    if enrichment.validation.is_none() {
        let why = enrichment
            .validation_error
            .as_deref()
            .unwrap_or("no response");
        reasons.push(format!("validation unavailable: {why}"));
    }
    (!reasons.is_empty()).then(|| reasons.join("; "))
}
