//! Tie-break bonus (0..=20). Never moves a decision across a threshold; it
//! only orders candidates that landed in the same decision tier.

use std::collections::BTreeSet;

use predicate_core::{BonusBreakdown, DeviceAttributes, DeviceId, ScoreComponent, SeTableDetail, SubjectDevice};

pub const COMPONENT_MAX: u32 = 5;

/// Corporate suffixes ignored when comparing applicant names.
const COMPANY_SUFFIXES: &[&str] = &[
    "inc", "incorporated", "llc", "ltd", "limited", "corp", "corporation", "co", "company", "gmbh",
    "ag", "sa", "sas", "bv", "nv", "plc", "pty", "kk", "srl", "spa", "ab", "oy", "as",
];

/// Words too common in indications-for-use text to signal overlap.
const IFU_STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "use", "used", "intended", "indicated", "device", "devices",
    "patient", "patients", "are", "that", "this", "which", "from", "into", "its", "may", "can",
    "also", "such", "other", "than", "when", "within", "during", "not", "being", "have", "has",
];

pub fn chain_depth(id: &DeviceId, depth: Option<u32>) -> (u32, String) {
    if id.is_de_novo() && depth.unwrap_or(0) == 0 {
        return (3, "De Novo chain root".to_string());
    }
    match depth {
        Some(d) if d >= 3 => (5, format!("chain depth {d}")),
        Some(2) => (3, "chain depth 2".to_string()),
        Some(1) => (1, "chain depth 1".to_string()),
        Some(_) => (0, "chain depth 0".to_string()),
        None => (0, "chain depth unknown".to_string()),
    }
}

pub fn se_table(detail: Option<SeTableDetail>) -> (u32, String) {
    match detail {
        Some(SeTableDetail::Detailed) => (5, "detailed SE table".to_string()),
        Some(SeTableDetail::Minimal) => (2, "minimal SE table".to_string()),
        Some(SeTableDetail::None) => (0, "no SE table".to_string()),
        None => (0, "SE table unknown".to_string()),
    }
}

/// Lower-case, strip punctuation and trailing corporate suffixes.
pub fn normalize_company(name: &str) -> String {
    let mut words: Vec<String> = name
        .split(|c: char| c.is_whitespace() || c == ',' || c == '.')
        .filter(|w| !w.is_empty())
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric() || *c == '&')
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();
    while words.len() > 1 && words.last().is_some_and(|w| COMPANY_SUFFIXES.contains(&w.as_str())) {
        words.pop();
    }
    words.join(" ")
}

pub fn applicant_similarity(subject: &SubjectDevice, attributes: Option<&DeviceAttributes>) -> (u32, String) {
    let norm = |s: Option<&String>| s.map(|v| normalize_company(v)).filter(|v| !v.is_empty());
    let subject_company = norm(subject.company.as_ref());
    let subject_parent = norm(subject.parent_company.as_ref());
    let applicant = attributes.and_then(|a| norm(a.applicant.as_ref()));
    let applicant_parent = attributes.and_then(|a| norm(a.applicant_parent.as_ref()));

    if subject_company.is_some() && subject_company == applicant {
        return (5, "same applicant".to_string());
    }

    let subject_side: Vec<&String> = [subject_company.as_ref(), subject_parent.as_ref()]
        .into_iter()
        .flatten()
        .collect();
    let candidate_side: Vec<&String> = [applicant.as_ref(), applicant_parent.as_ref()]
        .into_iter()
        .flatten()
        .collect();
    let shares_parent = (subject_parent.is_some() || applicant_parent.is_some())
        && subject_side.iter().any(|s| candidate_side.contains(s));
    if shares_parent {
        return (3, "same parent company".to_string());
    }

    if applicant.is_none() || subject_company.is_none() {
        (0, "applicant unknown".to_string())
    } else {
        (0, "different applicant".to_string())
    }
}

fn ifu_keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '-')
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= 3 && !IFU_STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Share of the subject's indication keywords present in the candidate's
/// cleared indication.
pub fn ifu_overlap_ratio(subject: &str, cleared: &str) -> Option<f64> {
    let wanted = ifu_keywords(subject);
    if wanted.is_empty() {
        return None;
    }
    let have = ifu_keywords(cleared);
    let shared = wanted.intersection(&have).count();
    Some(shared as f64 / wanted.len() as f64)
}

pub fn ifu_overlap(subject: &SubjectDevice, attributes: Option<&DeviceAttributes>) -> (u32, String) {
    let cleared = attributes.and_then(|a| a.cleared_indication.as_deref());
    let ratio = match (subject.indication.as_deref(), cleared) {
        (Some(s), Some(c)) => ifu_overlap_ratio(s, c),
        _ => None,
    };
    let Some(ratio) = ratio else {
        return (0, "indication unknown".to_string());
    };
    let points = if ratio > 0.8 {
        5
    } else if ratio >= 0.5 {
        3
    } else if ratio >= 0.2 {
        1
    } else {
        0
    };
    (points, format!("IFU keyword overlap {:.0}%", ratio * 100.0))
}

pub fn bonus(id: &DeviceId, subject: &SubjectDevice, attributes: Option<&DeviceAttributes>) -> BonusBreakdown {
    let make = |name: &str, (points, rule): (u32, String)| {
        ScoreComponent::new(name, points.min(COMPONENT_MAX), COMPONENT_MAX, rule)
    };
    let chain_depth = make("chain_depth", chain_depth(id, attributes.and_then(|a| a.chain_depth)));
    let se_table = make("se_table", se_table(attributes.and_then(|a| a.se_table)));
    let applicant_similarity = make("applicant_similarity", applicant_similarity(subject, attributes));
    let ifu_overlap = make("ifu_overlap", ifu_overlap(subject, attributes));
    let total = chain_depth.points + se_table.points + applicant_similarity.points + ifu_overlap.points;
    BonusBreakdown {
        chain_depth,
        se_table,
        applicant_similarity,
        ifu_overlap,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> DeviceId {
        DeviceId::parse(s).unwrap()
    }

    #[test]
    fn de_novo_chain_root_exemption() {
        assert_eq!(chain_depth(&id("DEN180001"), Some(0)).0, 3);
        assert_eq!(chain_depth(&id("DEN180001"), None).0, 3);
        assert_eq!(chain_depth(&id("DEN180001"), Some(4)).0, 5);
        assert_eq!(chain_depth(&id("K123456"), Some(0)).0, 0);
    }

    #[test]
    fn chain_depth_tiers() {
        let k = id("K123456");
        assert_eq!(chain_depth(&k, Some(3)).0, 5);
        assert_eq!(chain_depth(&k, Some(2)).0, 3);
        assert_eq!(chain_depth(&k, Some(1)).0, 1);
        assert_eq!(chain_depth(&k, None).0, 0);
    }

    #[test]
    fn company_normalisation() {
        assert_eq!(normalize_company("Acme Medical, Inc."), "acme medical");
        assert_eq!(normalize_company("ACME MEDICAL LLC"), "acme medical");
        assert_eq!(normalize_company("Siemens Healthineers AG"), "siemens healthineers");
        assert_eq!(normalize_company("Inc"), "inc");
    }

    #[test]
    fn applicant_tiers() {
        let subject = SubjectDevice {
            company: Some("Acme Medical, Inc.".into()),
            parent_company: Some("Acme Holdings".into()),
            ..Default::default()
        };
        let same = DeviceAttributes {
            applicant: Some("ACME MEDICAL LLC".into()),
            ..Default::default()
        };
        assert_eq!(applicant_similarity(&subject, Some(&same)).0, 5);

        let sibling = DeviceAttributes {
            applicant: Some("Acme Imaging".into()),
            applicant_parent: Some("Acme Holdings Corp".into()),
            ..Default::default()
        };
        assert_eq!(applicant_similarity(&subject, Some(&sibling)).0, 3);

        let other = DeviceAttributes {
            applicant: Some("Globex".into()),
            ..Default::default()
        };
        assert_eq!(applicant_similarity(&subject, Some(&other)).0, 0);
        assert_eq!(applicant_similarity(&subject, None).0, 0);
    }

    #[test]
    fn ifu_overlap_tiers() {
        let subject = SubjectDevice {
            indication: Some("detection of intracranial hemorrhage on head CT images".into()),
            ..Default::default()
        };
        // keywords: detection intracranial hemorrhage head images (5)
        let attrs = |text: &str| DeviceAttributes {
            cleared_indication: Some(text.into()),
            ..Default::default()
        };
        let full = attrs("triage and detection of intracranial hemorrhage in head CT images");
        assert_eq!(ifu_overlap(&subject, Some(&full)).0, 5);
        let most = attrs("detection of intracranial hemorrhage");
        assert_eq!(ifu_overlap(&subject, Some(&most)).0, 3);
        let some = attrs("head images");
        assert_eq!(ifu_overlap(&subject, Some(&some)).0, 1);
        let none = attrs("orthopedic bone screw");
        assert_eq!(ifu_overlap(&subject, Some(&none)).0, 0);
        assert_eq!(ifu_overlap(&SubjectDevice::default(), Some(&full)).0, 0);
    }

    #[test]
    fn bonus_total_within_bounds() {
        let subject = SubjectDevice::default();
        let attrs = DeviceAttributes {
            chain_depth: Some(7),
            se_table: Some(SeTableDetail::Detailed),
            ..Default::default()
        };
        let b = bonus(&id("K123456"), &subject, Some(&attrs));
        assert_eq!(b.total, 10);
        assert!(b.total <= 20);
    }

    #[test]
    fn bonus_tops_out_at_twenty() {
        let subject = SubjectDevice {
            company: Some("Acme Medical, Inc.".into()),
            indication: Some("continuous glucose monitoring in adults".into()),
            ..Default::default()
        };
        let mut best = 0;
        for prefix in ["K123456", "DEN180001", "P123456"] {
            for depth in [None, Some(0), Some(1), Some(2), Some(3), Some(50), Some(u32::MAX)] {
                for detail in [None, Some(SeTableDetail::None), Some(SeTableDetail::Minimal), Some(SeTableDetail::Detailed)] {
                    let attrs = DeviceAttributes {
                        chain_depth: depth,
                        se_table: detail,
                        applicant: Some("ACME MEDICAL LLC".into()),
                        cleared_indication: Some("Continuous glucose monitoring in adults.".into()),
                        ..Default::default()
                    };
                    let b = bonus(&id(prefix), &subject, Some(&attrs));
                    assert!(b.components().iter().all(|c| c.points <= c.max));
                    assert!(b.total <= 4 * COMPONENT_MAX);
                    best = best.max(b.total);
                }
            }
        }
        assert_eq!(best, 20);
    }
}
