//! Heading libraries for section detection.
//!
//! Three fixed tables drive the classifier:
//!
//! - [`HEADING_PATTERNS`]: canonical and device-type-specific headings used by
//!   the regex and OCR-tolerant tiers. Patterns match a whole heading line after
//!   its numbering (`5.`, `IV.`, `B)`) is stripped.
//! - [`HEADING_VARIANTS`]: non-standard and EU-style headings the semantic tier
//!   maps onto canonical categories.
//! - [`SE_KEYWORDS`] / [`MIXED_KEYWORDS`]: word stems counted in the semantic
//!   tier's word window.

use std::sync::LazyLock;

use predicate_core::SectionCategory;
use regex::Regex;

/// Lines longer than this are body text, not headings.
pub const MAX_HEADING_CHARS: usize = 120;

/// `(category, label, phrase regex)`; phrases are anchored at the start of the
/// de-numbered line and may be preceded by a short lead-in like "Summary of".
/// After the phrase the line must end, continue as a label (`: K123456`,
/// `- K123456`), or carry at most four qualifier words ("Comparison Table").
pub const HEADING_PATTERNS: &[(SectionCategory, &str, &str)] = &[
    // ── Canonical SE headings ──
    (SectionCategory::Se, "substantial equivalence", r"substantial\s+equivalence"),
    (SectionCategory::Se, "substantially equivalent", r"substantially\s+equivalent"),
    (SectionCategory::Se, "predicate device", r"(?:legally\s+marketed\s+)?predicate\s+devices?"),
    (
        SectionCategory::Se,
        "comparison to predicate",
        r"comparisons?\s+(?:to|with|of)\s+(?:the\s+)?(?:legally\s+marketed\s+)?predicate",
    ),
    (SectionCategory::Se, "technological characteristics", r"technological\s+characteristics"),
    (SectionCategory::Se, "SE comparison", r"se\s+(?:comparison|discussion|table)"),
    (SectionCategory::Se, "device comparison", r"device\s+comparison"),
    (SectionCategory::Se, "equivalence comparison", r"equivalence\s+(?:comparison|discussion|table)"),
    (
        SectionCategory::Se,
        "comparison of indications",
        r"comparison\s+of\s+(?:the\s+)?(?:intended\s+use|indications)",
    ),
    // ── Device-type-specific SE headings ──
    (
        SectionCategory::Se,
        "software comparison",
        r"(?:software|algorithm)\s+(?:design\s+)?(?:comparison|equivalence)",
    ),
    (
        SectionCategory::Se,
        "implant comparison",
        r"(?:implant|catheter|stent|assay|reagent|imaging\s+system)\s+(?:design\s+)?comparison",
    ),
    (
        SectionCategory::Se,
        "comparison of device type",
        r"comparison\s+of\s+(?:the\s+)?(?:implant|software|assay|catheter|imaging)",
    ),
    // ── Testing / clinical headings ──
    (
        SectionCategory::Mixed,
        "performance testing",
        r"performance\s+(?:testing|tests|data|evaluation)",
    ),
    (
        SectionCategory::Mixed,
        "non-clinical testing",
        r"(?:non-?\s?clinical|bench)\s+(?:testing|tests|performance|data|studies)",
    ),
    (
        SectionCategory::Mixed,
        "clinical testing",
        r"clinical\s+(?:testing|tests|studies|study|performance|data)",
    ),
    (SectionCategory::Mixed, "biocompatibility", r"biocompatibility"),
    (
        SectionCategory::Mixed,
        "verification and validation",
        r"(?:software\s+)?verification\s+(?:and|&)\s+validation",
    ),
    (SectionCategory::Mixed, "sterilization", r"steriliz(?:ation|ing)"),
    (SectionCategory::Mixed, "electrical safety", r"electrical\s+safety"),
];

/// Non-standard and EU-style heading variants mapped to canonical categories.
pub const HEADING_VARIANTS: &[(&str, SectionCategory)] = &[
    ("equivalence assessment", SectionCategory::Se),
    ("demonstration of equivalence", SectionCategory::Se),
    ("equivalent device", SectionCategory::Se),
    ("equivalent devices", SectionCategory::Se),
    ("comparison with similar devices", SectionCategory::Se),
    ("similar devices", SectionCategory::Se),
    ("comparable devices", SectionCategory::Se),
    ("comparator device", SectionCategory::Se),
    ("comparator devices", SectionCategory::Se),
    ("reference device comparison", SectionCategory::Se),
    ("benchmark devices", SectionCategory::Se),
    ("device equivalence", SectionCategory::Se),
    ("clinical equivalence", SectionCategory::Se),
    ("technical equivalence", SectionCategory::Se),
    ("biological equivalence", SectionCategory::Se),
    ("state of the art and similar devices", SectionCategory::Se),
    ("comparison to marketed devices", SectionCategory::Se),
    ("competitor devices", SectionCategory::Se),
    ("clinical evaluation", SectionCategory::Mixed),
    ("clinical evaluation report", SectionCategory::Mixed),
    ("performance evaluation", SectionCategory::Mixed),
    ("pre-clinical evaluation", SectionCategory::Mixed),
    ("design verification", SectionCategory::Mixed),
    ("design validation", SectionCategory::Mixed),
    ("usability evaluation", SectionCategory::Mixed),
    ("risk management", SectionCategory::Mixed),
    ("post-market clinical follow-up", SectionCategory::Mixed),
    ("analytical performance", SectionCategory::Mixed),
    ("literature review", SectionCategory::Mixed),
    ("device description", SectionCategory::General),
    ("intended purpose", SectionCategory::General),
    ("general information", SectionCategory::General),
    ("background", SectionCategory::General),
    ("introduction", SectionCategory::General),
];

/// Word stems that signal a predicate-comparison passage.
pub const SE_KEYWORDS: &[&str] = &[
    "predicate",
    "equivalen",
    "compar",
    "technological",
    "similarit",
    "identical",
    "differences",
];

/// Word stems that signal a testing or clinical passage.
pub const MIXED_KEYWORDS: &[&str] = &[
    "testing",
    "tested",
    "bench",
    "clinical",
    "performance",
    "biocompatib",
    "verification",
    "validation",
    "study",
    "studies",
    "sterili",
];

/// Strips outline numbering: `5.`, `5.2`, `IV.`, `B)`, `(a)`.
static NUMBERING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:\d+(?:\.\d+)+\.?\s+|\(?(?:\d+|[ivx]+|[a-h])[.):]\s*|\d+\s+)")
        .expect("numbering pattern compiles")
});

static COMPILED: LazyLock<Vec<(SectionCategory, &'static str, Regex)>> = LazyLock::new(|| {
    HEADING_PATTERNS
        .iter()
        .map(|&(category, label, phrase)| {
            let pattern = format!(
                r"(?i)^(?:(?:summary|discussion|statement|determination|table)\s+of\s+(?:the\s+)?)?(?:{phrase})\b(?:\s*[:\-\x{{2013}}\x{{2014}}].*|(?P<tail>(?:\s+[a-z&/()\-]+){{1,4}}))?\s*$"
            );
            let regex = Regex::new(&pattern).expect("heading pattern compiles");
            (category, label, regex)
        })
        .collect()
});

/// Remove outline numbering and trailing punctuation from a candidate line.
pub fn strip_numbering(line: &str) -> &str {
    let trimmed = line.trim();
    let rest = match NUMBERING.find(trimmed) {
        Some(m) => &trimmed[m.end()..],
        None => trimmed,
    };
    rest.trim_end_matches(|c: char| c == ':' || c == '.' || c.is_whitespace())
}

/// Match one line against the heading library.
///
/// Returns the category and label of the first matching pattern. SE patterns
/// precede Mixed ones in the table, so SE wins when both would match.
pub fn match_heading(line: &str) -> Option<(SectionCategory, &'static str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_HEADING_CHARS {
        return None;
    }
    // "Predicate device was recalled." reads as a sentence, not a heading.
    let sentence = trimmed.ends_with(['.', '?', '!']);
    let candidate = strip_numbering(trimmed);
    COMPILED.iter().find_map(|(category, label, regex)| {
        let caps = regex.captures(candidate)?;
        if sentence && caps.name("tail").is_some() {
            return None;
        }
        Some((*category, *label))
    })
}

/// Match a line against the non-standard variant table.
///
/// The de-numbered, lower-cased line must equal a variant or start with it
/// followed by a non-letter.
pub fn match_variant(line: &str) -> Option<(&'static str, SectionCategory)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_HEADING_CHARS {
        return None;
    }
    let candidate = strip_numbering(trimmed).to_lowercase();
    HEADING_VARIANTS
        .iter()
        // Longest variant first so "clinical evaluation report" beats "clinical evaluation".
        .filter(|(variant, _)| {
            candidate == *variant
                || candidate
                    .strip_prefix(variant)
                    .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphabetic()))
        })
        .max_by_key(|(variant, _)| variant.len())
        .map(|&(variant, category)| (variant, category))
}

/// Keyword stems associated with a category, if the category has any.
pub fn keywords_for(category: SectionCategory) -> &'static [&'static str] {
    match category {
        SectionCategory::Se => SE_KEYWORDS,
        SectionCategory::Mixed => MIXED_KEYWORDS,
        SectionCategory::General | SectionCategory::TableOrImage => &[],
    }
}
