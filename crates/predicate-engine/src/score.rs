//! Base confidence score (0..=100).
//!
//! Each component is a pure function returning `(points, rule)`; [`score`]
//! sums them into a [`ScoreBreakdown`].

use std::collections::BTreeSet;

use chrono::{Months, NaiveDate};
use predicate_core::{
    AttributeLookup, CitationSummary, DeviceAttributes, ReviewConfig, ReviewError, ScoreBreakdown,
    ScoreComponent, SectionCategory,
};
use tracing::error;

pub const SECTION_MAX: u32 = 40;
pub const FREQUENCY_MAX: u32 = 20;
pub const PRODUCT_CODE_MAX: u32 = 15;
pub const RECENCY_MAX: u32 = 15;
pub const HISTORY_MAX: u32 = 10;
pub const BASE_MAX: u32 = 100;

/// Product codes and review panels the candidate is judged against: the
/// subject device's own plus those of every citing document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relatedness {
    pub product_codes: BTreeSet<String>,
    pub panels: BTreeSet<String>,
}

impl Relatedness {
    pub fn add(&mut self, product_code: Option<&str>, panel: Option<&str>) {
        if let Some(code) = product_code.map(normalize_code).filter(|c| !c.is_empty()) {
            self.product_codes.insert(code);
        }
        if let Some(panel) = panel.map(normalize_code).filter(|p| !p.is_empty()) {
            self.panels.insert(panel);
        }
    }
}

fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Inputs the base scorer reads for one device.
pub struct ScoreInput<'a> {
    pub citations: &'a CitationSummary,
    pub lookup: &'a AttributeLookup,
    pub related: &'a Relatedness,
    pub review_date: NaiveDate,
    pub config: &'a ReviewConfig,
}

pub fn section_context(citations: &CitationSummary) -> (u32, String) {
    let ladder = [
        SectionCategory::Se,
        SectionCategory::Mixed,
        SectionCategory::TableOrImage,
        SectionCategory::General,
    ];
    for category in ladder {
        if citations.has_category(category) {
            return (
                category.weight(),
                format!("cited in {} context", category.as_str()),
            );
        }
    }
    (0, "no mentions".to_string())
}

pub fn citation_frequency(weighted: f64) -> (u32, String) {
    let points = if weighted >= 5.0 {
        20
    } else if weighted >= 3.0 {
        15
    } else if weighted >= 2.0 {
        10
    } else if weighted > 0.0 {
        5
    } else {
        0
    };
    (points, format!("weighted citation score {weighted:.1}"))
}

pub fn product_code(attributes: Option<&DeviceAttributes>, related: &Relatedness) -> (u32, String) {
    let Some(attrs) = attributes else {
        return (0, "product code unknown".to_string());
    };
    if let Some(code) = attrs.product_code.as_deref().map(normalize_code) {
        if related.product_codes.contains(&code) {
            return (PRODUCT_CODE_MAX, format!("same product code {code}"));
        }
    }
    if let Some(panel) = attrs.review_panel.as_deref().map(normalize_code) {
        if related.panels.contains(&panel) {
            return (8, format!("same review panel {panel}"));
        }
    }
    match attrs.product_code.as_deref() {
        Some(code) => (0, format!("unrelated product code {}", normalize_code(code))),
        None => (0, "product code unknown".to_string()),
    }
}

/// Clearance age tiers; each boundary belongs to the younger tier.
pub fn recency(decision_date: Option<NaiveDate>, review_date: NaiveDate) -> (u32, String) {
    let Some(date) = decision_date else {
        return (5, "clearance date unknown".to_string());
    };
    let within = |years: u32| {
        review_date
            .checked_sub_months(Months::new(years * 12))
            .is_none_or(|cutoff| date >= cutoff)
    };
    let (points, band) = if within(5) {
        (15, "within 5 years")
    } else if within(10) {
        (10, "within 10 years")
    } else if within(15) {
        (5, "within 15 years")
    } else {
        (2, "older than 15 years")
    };
    (points, format!("cleared {date}, {band}"))
}

pub fn regulatory_history(attributes: Option<&DeviceAttributes>, config: &ReviewConfig) -> (u32, String) {
    let Some(attrs) = attributes else {
        return (5, "history unknown".to_string());
    };
    let events = attrs.adverse_event_count;
    let deaths = attrs.death_event_count.unwrap_or(0);

    if attrs.has_class_i_recall() {
        return (0, "Class I recall".to_string());
    }
    if deaths > 0 {
        return (0, format!("{deaths} death event(s)"));
    }
    if let Some(n) = events.filter(|&n| n >= config.maude_high_events) {
        return (0, format!("{n} adverse events"));
    }
    if attrs.has_lesser_recall() {
        return (5, "Class II/III recall".to_string());
    }
    if let Some(n) = events.filter(|&n| n >= config.maude_moderate_events) {
        return (5, format!("{n} adverse events"));
    }
    if let Some(missing) = missing_history(attrs) {
        return (5, format!("history unknown: {missing} not on record"));
    }
    (HISTORY_MAX, "clean history".to_string())
}

/// Which history signals the registry left unanswered, if any. Clean
/// history needs both the recall and the adverse event lookups.
pub fn missing_history(attrs: &DeviceAttributes) -> Option<&'static str> {
    match (attrs.recalls.is_none(), attrs.adverse_event_count.is_none()) {
        (true, true) => Some("recalls and adverse events"),
        (true, false) => Some("recalls"),
        (false, true) => Some("adverse events"),
        (false, false) => None,
    }
}

/// Build a component, clamping points that exceed the component maximum.
fn component(
    name: &str,
    (points, rule): (u32, String),
    max: u32,
    issues: &mut Vec<ReviewError>,
) -> ScoreComponent {
    if points > max {
        let err = ReviewError::ScoreOutOfRange {
            component: name.to_string(),
            value: i64::from(points),
            max,
        };
        error!(%err, "clamping score component");
        issues.push(err);
        return ScoreComponent::new(name, max, max, rule);
    }
    ScoreComponent::new(name, points, max, rule)
}

/// Compute the five-component base score.
///
/// Out-of-range values are clamped and returned as issues.
pub fn score(input: &ScoreInput<'_>) -> (ScoreBreakdown, Vec<ReviewError>) {
    let mut issues = Vec::new();
    let attrs = input.lookup.attributes();

    let section_context = component(
        "section_context",
        section_context(input.citations),
        SECTION_MAX,
        &mut issues,
    );
    let citation_frequency = component(
        "citation_frequency",
        citation_frequency(input.citations.weighted_citation_score),
        FREQUENCY_MAX,
        &mut issues,
    );
    let product_code = component(
        "product_code",
        product_code(attrs, input.related),
        PRODUCT_CODE_MAX,
        &mut issues,
    );
    let recency = component(
        "recency",
        recency(attrs.and_then(|a| a.decision_date), input.review_date),
        RECENCY_MAX,
        &mut issues,
    );
    let regulatory_history = component(
        "regulatory_history",
        regulatory_history(attrs, input.config),
        HISTORY_MAX,
        &mut issues,
    );

    let sum = section_context.points
        + citation_frequency.points
        + product_code.points
        + recency.points
        + regulatory_history.points;
    let total = if sum > BASE_MAX {
        let err = ReviewError::ScoreOutOfRange {
            component: "total".to_string(),
            value: i64::from(sum),
            max: BASE_MAX,
        };
        error!(%err, "clamping base score");
        issues.push(err);
        BASE_MAX
    } else {
        sum
    };

    (
        ScoreBreakdown {
            section_context,
            citation_frequency,
            product_code,
            recency,
            regulatory_history,
            total,
        },
        issues,
    )
}
