//! Vertical card display for review records, audit entries and exclusions.

use predicate_core::{ExclusionSnapshot, ScoreComponent};
use predicate_engine::{DeviceRecord, ReviewReport};
use predicate_store::{AuditEntry, ChainSummary};

const MAX_LIST_ITEMS: usize = 10;

fn row(out: &mut String, label: &str, value: impl std::fmt::Display) {
    out.push_str(&format!("  {label:<26} {value}\n"));
}

fn component(out: &mut String, c: &ScoreComponent) {
    out.push_str(&format!(
        "  {:<26} {:>2}/{:<3} {}\n",
        c.name, c.points, c.max, c.rule
    ));
}

/// One device as a card grouped by stage.
pub fn record_card(record: &DeviceRecord) -> String {
    let audit = &record.audit;
    let mut out = format!(
        "=== {} === {} ({})\n",
        record.device_id,
        record.decision.as_str(),
        audit.rule
    );
    out.push_str(&format!("{}\n\n", audit.rationale));

    let c = &record.citations;
    out.push_str("Citations\n");
    row(&mut out, "documents", c.unique_source_count);
    row(&mut out, "weighted_citation_score", format!("{:.1}", c.weighted_citation_score));
    let histogram: Vec<String> = c
        .histogram
        .iter()
        .map(|(category, n)| format!("{}×{n}", category.as_str()))
        .collect();
    row(&mut out, "sections", histogram.join(", "));
    if c.low_confidence_mentions > 0 {
        row(&mut out, "low_confidence_mentions", c.low_confidence_mentions);
    }
    out.push('\n');

    match &record.score {
        Some(score) => {
            out.push_str("Score\n");
            for c in score.components() {
                component(&mut out, c);
            }
            row(&mut out, "total", score.total);
            if let Some(adjusted) = record.adjusted_score {
                row(
                    &mut out,
                    "adjusted",
                    format!("{adjusted} (accept at {})", audit.accept_threshold),
                );
            }
        }
        None => out.push_str("Score\n  (not computed)\n"),
    }
    if let Some(bonus) = &record.bonus {
        out.push_str("Bonus\n");
        for c in bonus.components() {
            component(&mut out, c);
        }
        row(&mut out, "total", bonus.total);
    }
    out.push('\n');

    if !record.flags.is_empty() {
        out.push_str("Flags\n");
        for flag in &record.flags {
            out.push_str(&format!(
                "  {:<9} {:<26} {}\n",
                flag.severity.as_str(),
                flag.kind.as_str(),
                flag.rationale
            ));
        }
        out.push('\n');
    }

    out.push_str("Role\n");
    let from = record.role.from.map_or("(new)", |r| r.as_str());
    row(
        &mut out,
        &format!("{from} -> {}", record.role.to.as_str()),
        &record.role.reason,
    );
    if let Some(citation) = &audit.governing_citation {
        row(&mut out, "governing_citation", citation);
    }
    if let Some(note) = &audit.override_note {
        row(&mut out, "override", note);
    }
    if !audit.issues.is_empty() {
        out.push_str("Issues\n");
        for issue in audit.issues.iter().take(MAX_LIST_ITEMS) {
            row(&mut out, &issue.code, &issue.message);
        }
        if audit.issues.len() > MAX_LIST_ITEMS {
            out.push_str(&format!("  ... and {} more\n", audit.issues.len() - MAX_LIST_ITEMS));
        }
    }
    row(&mut out, "fingerprint", &audit.fingerprint);
    out
}

pub fn print_report(report: &ReviewReport) {
    for record in &report.records {
        println!("{}", record_card(record));
    }
    println!("{}", summary_line(report));
    for issue in &report.issues {
        println!("  {:<26} {}", issue.code, issue.message);
    }
}

pub fn summary_line(report: &ReviewReport) -> String {
    use predicate_core::Decision;
    format!(
        "Review {} (exclusions v{}): {} devices, {} accepted, {} deferred, {} rejected",
        report.review_date,
        report.exclusion_version,
        report.records.len(),
        report.count(Decision::Accept),
        report.count(Decision::Defer),
        report.count(Decision::Reject),
    )
}

pub fn print_exclusions(snapshot: &ExclusionSnapshot) {
    println!("Exclusions (v{}, {} entries)", snapshot.version, snapshot.len());
    for (id, entry) in &snapshot.entries {
        println!(
            "  {:<14} {:<7} {}  {}",
            id.as_str(),
            entry.added_by.as_str(),
            entry.added.format("%Y-%m-%d %H:%M"),
            entry.reason
        );
    }
}

pub fn print_history(entries: &[AuditEntry]) {
    for e in entries {
        let r = &e.record;
        let score = r
            .adjusted_score
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        println!(
            "  #{:<5} {}  {:<7} {:>4}  {}",
            e.seq,
            r.created_at.format("%Y-%m-%d %H:%M:%S"),
            r.decision.as_str(),
            score,
            r.rule
        );
        if let Some(prev) = &e.supersedes {
            println!("         supersedes {}", &prev[..prev.len().min(16)]);
        }
    }
}

pub fn print_chain_summary(summary: &ChainSummary) {
    println!(
        "Audit chain OK: {} entries, {} devices, head {}",
        summary.entries, summary.devices, summary.head
    );
}
