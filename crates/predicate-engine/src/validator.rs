//! Maps upstream web validation and compliance results into flags, a score
//! adjustment and a pre-validation rejection. No judgment of its own.

use predicate_core::{ChecklistItem, FlagKind, RiskFlag, ValidationReport, WebFlag};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatorOutcome {
    pub flags: Vec<RiskFlag>,
    /// Points added to the base score (zero or negative).
    pub adjustment: i64,
    /// Set when the device must be rejected before scoring.
    pub rejection: Option<String>,
    pub checklist: Vec<ChecklistItem>,
    /// Citation of the first failed criterion, if any.
    pub governing_citation: Option<String>,
}

/// Normalise a validation report. A missing report yields no flags and no
/// adjustment; the caller records the gap separately.
pub fn adapt(report: Option<&ValidationReport>, yellow_penalty: u32) -> ValidatorOutcome {
    let Some(report) = report else {
        return ValidatorOutcome::default();
    };
    let mut outcome = ValidatorOutcome::default();
    let mut reasons = Vec::new();

    match report.web.flag {
        WebFlag::Red => {
            outcome.flags.push(RiskFlag::new(
                FlagKind::WebValidationRed,
                "web_validation",
                report.web.rationale.clone(),
            ));
            reasons.push(format!("web validation RED: {}", report.web.rationale));
        }
        WebFlag::Yellow => {
            outcome.flags.push(RiskFlag::new(
                FlagKind::WebValidationYellow,
                "web_validation",
                report.web.rationale.clone(),
            ));
            outcome.adjustment = -i64::from(yellow_penalty);
        }
        WebFlag::Green => {}
    }

    outcome.checklist = report
        .compliance
        .failed_criteria
        .iter()
        .map(|criterion| ChecklistItem {
            criterion: criterion.clone(),
            passed: false,
        })
        .collect();
    outcome.governing_citation = report
        .compliance
        .failed_criteria
        .iter()
        .find_map(|c| c.citation.clone());

    if !report.compliance.compliant {
        let failed: Vec<&str> = report
            .compliance
            .failed_criteria
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        let rationale = if failed.is_empty() {
            "regulatory criteria not met".to_string()
        } else {
            format!("failed criteria: {}", failed.join(", "))
        };
        reasons.push(format!("non-compliant, {rationale}"));
        outcome.flags.push(RiskFlag::new(
            FlagKind::FdaCriteriaNonCompliant,
            "compliance",
            rationale,
        ));
    }

    if !reasons.is_empty() {
        outcome.rejection = Some(reasons.join("; "));
    }
    outcome
}
