//! Independent risk flags.
//!
//! Each rule looks at one signal; none depends on another's outcome. The
//! result is sorted by severity (highest first) and then by kind.

use chrono::{Months, NaiveDate};
use predicate_core::{
    AttributeLookup, DeviceClass, DeviceId, ExclusionEntry, FlagKind, ReviewConfig, RiskFlag,
};

use crate::score::missing_history;
use crate::validator::ValidatorOutcome;

pub struct FlagInput<'a> {
    pub device_id: &'a DeviceId,
    pub lookup: &'a AttributeLookup,
    pub validator: &'a ValidatorOutcome,
    /// Why enrichment is incomplete, if it is.
    pub incomplete: Option<&'a str>,
    pub exclusion: Option<&'a ExclusionEntry>,
    pub review_date: NaiveDate,
    pub config: &'a ReviewConfig,
}

pub fn assess(input: &FlagInput<'_>) -> Vec<RiskFlag> {
    let mut flags = Vec::new();
    let id = input.device_id;

    if let Some(entry) = input.exclusion {
        flags.push(RiskFlag::new(
            FlagKind::Excluded,
            "exclusions",
            format!("{} ({})", entry.reason, entry.added_by.as_str()),
        ));
    }

    flags.extend(input.validator.flags.iter().cloned());

    if let Some(reason) = input.incomplete {
        flags.push(RiskFlag::new(FlagKind::EnrichmentIncomplete, "enrichment", reason));
    }

    if id.is_supplement() {
        flags.push(RiskFlag::new(FlagKind::Supplement, "identifier", format!("{id} is a PMA supplement")));
    }
    if id.is_de_novo() {
        flags.push(RiskFlag::new(FlagKind::DenDevice, "identifier", format!("{id} is a De Novo")));
    }

    let attrs = input.lookup.attributes();

    if id.is_pma() || attrs.is_some_and(|a| a.pma_only) {
        let why = if id.is_pma() {
            "PMA identifier"
        } else {
            "registry reports PMA-only pathway"
        };
        flags.push(RiskFlag::new(FlagKind::PmaOnly, "identifier", why));
    }

    if id.is_de_novo() && attrs.and_then(|a| a.chain_depth).unwrap_or(0) == 0 {
        flags.push(RiskFlag::new(
            FlagKind::DenNoPredicates,
            "lineage",
            "De Novo with no predicate lineage",
        ));
    }

    if matches!(input.lookup, AttributeLookup::NotFound) {
        flags.push(RiskFlag::new(
            FlagKind::HistoryUnknown,
            "regulatory_history",
            "no registry record",
        ));
    }

    let Some(attrs) = attrs else {
        sort(&mut flags);
        return flags;
    };

    if attrs.has_class_i_recall() {
        flags.push(RiskFlag::new(FlagKind::RecalledClassI, "recalls", "Class I recall on record"));
    }
    if attrs.has_lesser_recall() {
        flags.push(RiskFlag::new(FlagKind::Recalled, "recalls", "Class II/III recall on record"));
    }
    if attrs.device_class == Some(DeviceClass::III) {
        flags.push(RiskFlag::new(FlagKind::ClassIii, "classification", "Class III device"));
    }
    if let Some(date) = attrs.decision_date {
        let cutoff = input
            .review_date
            .checked_sub_months(Months::new(input.config.old_after_years * 12));
        if cutoff.is_some_and(|c| date < c) {
            flags.push(RiskFlag::new(
                FlagKind::Old,
                "decision_date",
                format!(
                    "cleared {date}, more than {} years before review",
                    input.config.old_after_years
                ),
            ));
        }
    }
    if let Some(n) = attrs
        .adverse_event_count
        .filter(|&n| n >= input.config.maude_high_events)
    {
        flags.push(RiskFlag::new(FlagKind::HighMaude, "adverse_events", format!("{n} adverse events")));
    }
    if let Some(n) = attrs.death_event_count.filter(|&n| n > 0) {
        flags.push(RiskFlag::new(FlagKind::DeathEvents, "adverse_events", format!("{n} death event(s)")));
    }
    if let Some(missing) = missing_history(attrs) {
        flags.push(RiskFlag::new(
            FlagKind::HistoryUnknown,
            "regulatory_history",
            format!("{missing} not on record"),
        ));
    }
    if attrs.statement_only {
        flags.push(RiskFlag::new(
            FlagKind::StatementOnly,
            "documents",
            "only a 510(k) Statement is on file",
        ));
    }

    sort(&mut flags);
    flags
}

fn sort(flags: &mut [RiskFlag]) {
    flags.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.kind.cmp(&b.kind)));
}

pub fn has(flags: &[RiskFlag], kind: FlagKind) -> bool {
    flags.iter().any(|f| f.kind == kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use predicate_core::{DeviceAttributes, ExclusionOrigin, RecallClass, RecallRecord, Severity};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn run(id: &str, lookup: AttributeLookup) -> Vec<RiskFlag> {
        let id = DeviceId::parse(id).unwrap();
        let config = ReviewConfig::default();
        let validator = ValidatorOutcome::default();
        assess(&FlagInput {
            device_id: &id,
            lookup: &lookup,
            validator: &validator,
            incomplete: None,
            exclusion: None,
            review_date: date("2025-01-01"),
            config: &config,
        })
    }

    fn found(attributes: DeviceAttributes) -> AttributeLookup {
        AttributeLookup::Found { attributes }
    }

    #[test]
    fn recall_flags_by_class() {
        let flags = run(
            "K123456",
            found(DeviceAttributes {
                recalls: Some(vec![
                    RecallRecord {
                        class: RecallClass::ClassI,
                        recall_number: None,
                        initiated: None,
                        reason: None,
                    },
                    RecallRecord {
                        class: RecallClass::ClassII,
                        recall_number: None,
                        initiated: None,
                        reason: None,
                    },
                ]),
                ..Default::default()
            }),
        );
        assert_eq!(flags[0].kind, FlagKind::RecalledClassI);
        assert_eq!(flags[0].severity, Severity::Critical);
        assert!(has(&flags, FlagKind::Recalled));
    }

    #[test]
    fn identifier_flags() {
        let flags = run("P123456S001", AttributeLookup::NotFound);
        let kinds: Vec<FlagKind> = flags.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![FlagKind::PmaOnly, FlagKind::HistoryUnknown, FlagKind::Supplement]
        );

        let flags = run("DEN180001", AttributeLookup::NotFound);
        let kinds: Vec<FlagKind> = flags.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![FlagKind::HistoryUnknown, FlagKind::DenDevice, FlagKind::DenNoPredicates]
        );
    }

    #[test]
    fn old_threshold_is_strict() {
        let at = run(
            "K123456",
            found(DeviceAttributes {
                decision_date: Some(date("2015-01-01")),
                ..Default::default()
            }),
        );
        assert!(!has(&at, FlagKind::Old));
        let before = run(
            "K123456",
            found(DeviceAttributes {
                decision_date: Some(date("2014-12-31")),
                ..Default::default()
            }),
        );
        assert!(has(&before, FlagKind::Old));
    }

    #[test]
    fn maude_deaths_class_statement() {
        let flags = run(
            "K123456",
            found(DeviceAttributes {
                recalls: Some(vec![]),
                adverse_event_count: Some(150),
                death_event_count: Some(2),
                device_class: Some(DeviceClass::III),
                statement_only: true,
                ..Default::default()
            }),
        );
        let kinds: Vec<FlagKind> = flags.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FlagKind::ClassIii,
                FlagKind::HighMaude,
                FlagKind::DeathEvents,
                FlagKind::StatementOnly
            ]
        );
    }

    #[test]
    fn exclusion_and_incomplete_enrichment() {
        let id = DeviceId::parse("K123456").unwrap();
        let config = ReviewConfig::default();
        let entry = ExclusionEntry {
            reason: "known labeling issue".into(),
            added: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            added_by: ExclusionOrigin::Manual,
        };
        let flags = assess(&FlagInput {
            device_id: &id,
            lookup: &AttributeLookup::Failed {
                reason: "timeout".into(),
            },
            validator: &ValidatorOutcome::default(),
            incomplete: Some("lookup failed: timeout"),
            exclusion: Some(&entry),
            review_date: date("2025-01-01"),
            config: &config,
        });
        assert_eq!(flags[0].kind, FlagKind::Excluded);
        assert_eq!(flags[0].severity, Severity::User);
        assert_eq!(flags[1].kind, FlagKind::EnrichmentIncomplete);
    }

    #[test]
    fn partial_history_is_flagged() {
        let flags = run(
            "K123456",
            found(DeviceAttributes {
                adverse_event_count: Some(0),
                ..Default::default()
            }),
        );
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].kind, FlagKind::HistoryUnknown);
        assert_eq!(flags[0].rationale, "recalls not on record");

        let flags = run(
            "K123456",
            found(DeviceAttributes {
                recalls: Some(vec![]),
                ..Default::default()
            }),
        );
        assert_eq!(flags[0].kind, FlagKind::HistoryUnknown);
        assert_eq!(flags[0].severity, Severity::Medium);
        assert_eq!(flags[0].rationale, "adverse events not on record");

        let flags = run("K123456", AttributeLookup::NotFound);
        assert_eq!(flags[0].rationale, "no registry record");
    }

    #[test]
    fn clean_device_has_no_flags() {
        let flags = run(
            "K123456",
            found(DeviceAttributes {
                recalls: Some(vec![]),
                adverse_event_count: Some(0),
                decision_date: Some(date("2023-01-01")),
                device_class: Some(DeviceClass::II),
                ..Default::default()
            }),
        );
        assert!(flags.is_empty());
    }
}
