//! Decision engine: `Pending -> {Accept, Defer, Reject}`.
//!
//! Rules apply strictly in order:
//!
//! 1. an exclusion entry rejects;
//! 2. a RED web flag or failed compliance rejects without scoring;
//! 3. a YELLOW web flag lowers the base score;
//! 4. the adjusted score picks the band;
//! 5. an Accept with incomplete enrichment is held at Defer (configurable).

use predicate_core::{
    Decision, DecisionRule, DeviceId, ExclusionEntry, ReviewConfig, ReviewError, ScoreBreakdown,
};
use tracing::{debug, info};

use crate::validator::ValidatorOutcome;

pub struct DecisionInput<'a> {
    pub device_id: &'a DeviceId,
    pub exclusion: Option<&'a ExclusionEntry>,
    pub validator: &'a ValidatorOutcome,
    pub enrichment_incomplete: bool,
    pub config: &'a ReviewConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionOutcome {
    pub decision: Decision,
    pub rule: DecisionRule,
    pub rationale: String,
    /// `None` when scoring was bypassed.
    pub score: Option<ScoreBreakdown>,
    pub adjusted: Option<i64>,
    pub governing_citation: Option<String>,
    pub override_note: Option<String>,
    pub conflict: Option<ReviewError>,
}

/// Decide one device. `scorer` is invoked at most once and never for a
/// pre-validation rejection.
pub fn decide<F>(input: &DecisionInput<'_>, scorer: F) -> DecisionOutcome
where
    F: FnOnce() -> ScoreBreakdown,
{
    let config = input.config;
    let threshold = i64::from(config.accept_threshold);

    if let Some(entry) = input.exclusion {
        // Informational score, only when validation would not have blocked it.
        let (score, adjusted) = if input.validator.rejection.is_none() {
            let score = scorer();
            let adjusted = i64::from(score.total) + input.validator.adjustment;
            (Some(score), Some(adjusted))
        } else {
            (None, None)
        };

        let conflict = adjusted.filter(|&a| a >= threshold).map(|a| ReviewError::DecisionConflict {
            device_id: input.device_id.to_string(),
            detail: format!(
                "adjusted score {a} would accept (threshold {threshold}) but device is excluded: {}",
                entry.reason
            ),
        });
        let override_note = conflict.as_ref().map(ToString::to_string);
        if conflict.is_some() {
            info!(device = %input.device_id, "exclusion overrides accepting score");
        }

        return DecisionOutcome {
            decision: Decision::Reject,
            rule: DecisionRule::UserExclusion,
            rationale: format!("excluded by {}: {}", entry.added_by.as_str(), entry.reason),
            score,
            adjusted,
            governing_citation: Some(format!(
                "exclusion list entry added {}",
                entry.added.format("%Y-%m-%dT%H:%M:%SZ")
            )),
            override_note,
            conflict,
        };
    }

    if let Some(reason) = &input.validator.rejection {
        debug!(device = %input.device_id, "pre-validation rejection, scoring skipped");
        return DecisionOutcome {
            decision: Decision::Reject,
            rule: DecisionRule::PreValidationRejection,
            rationale: reason.clone(),
            score: None,
            adjusted: None,
            governing_citation: input.validator.governing_citation.clone(),
            override_note: None,
            conflict: None,
        };
    }

    let score = scorer();
    let adjusted = i64::from(score.total) + input.validator.adjustment;
    let adjustment_note = if input.validator.adjustment != 0 {
        format!(" ({} {:+})", score.total, input.validator.adjustment)
    } else {
        String::new()
    };

    let (mut decision, mut rule, mut rationale) = if adjusted >= threshold {
        (
            Decision::Accept,
            DecisionRule::ScoreAccept,
            format!("adjusted score {adjusted}{adjustment_note} >= accept threshold {threshold}"),
        )
    } else if adjusted >= i64::from(config.defer_floor) {
        (
            Decision::Defer,
            DecisionRule::ScoreDefer,
            format!(
                "adjusted score {adjusted}{adjustment_note} in defer band [{}, {threshold})",
                config.defer_floor
            ),
        )
    } else {
        (
            Decision::Reject,
            DecisionRule::ScoreReject,
            format!(
                "adjusted score {adjusted}{adjustment_note} below defer floor {}",
                config.defer_floor
            ),
        )
    };

    if decision == Decision::Accept && input.enrichment_incomplete && config.defer_on_incomplete_enrichment {
        decision = Decision::Defer;
        rule = DecisionRule::IncompleteEnrichment;
        rationale = format!("{rationale}, held at defer: enrichment incomplete");
    }

    DecisionOutcome {
        decision,
        rule,
        rationale,
        score: Some(score),
        adjusted: Some(adjusted),
        governing_citation: input.validator.governing_citation.clone(),
        override_note: None,
        conflict: None,
    }
}
