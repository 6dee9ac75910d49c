//! Three-tier section classifier.
//!
//! Tiers are chosen per document: the regex tier runs first, the OCR-tolerant
//! tier only when the regex tier found no heading anywhere in the document,
//! and the semantic strategy only when neither found one. Offsets are
//! character offsets throughout.

use std::collections::HashMap;

use predicate_core::{
    DeviceId, DeviceMention, RawMention, ReviewConfig, ReviewError, ReviewIssue, SectionCategory,
    SectionMatch, SectionTier, SourceDocument,
};
use tracing::{debug, warn};

use crate::headings;
use crate::strategy::{KeywordWindowStrategy, SectionStrategy};

/// OCR confusions: digit or bar read where a letter was printed.
const OCR_SUBSTITUTIONS: &[(char, char)] = &[('1', 'i'), ('0', 'o'), ('5', 's'), ('8', 'b'), ('|', 'l')];

/// A heading located in a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    pub category: SectionCategory,
    pub label: &'static str,
    /// Character offset of the first non-blank character of the heading line.
    pub start: usize,
    pub text: String,
}

/// Headings found in one document and the tier that found them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSections {
    /// `None` when neither heading tier found anything.
    pub tier: Option<SectionTier>,
    pub headings: Vec<Heading>,
}

impl DocumentSections {
    /// First heading of `category` whose window contains `offset`.
    fn covering(&self, category: SectionCategory, offset: usize, window: usize) -> Option<&Heading> {
        self.headings.iter().find(|h| {
            h.category == category && offset >= h.start && offset < h.start.saturating_add(window)
        })
    }
}

/// One classified mention plus an ambiguity note, if the semantic tier tied.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub section: SectionMatch,
    pub ambiguity: Option<String>,
}

/// Classified mentions plus the issues raised while producing them.
#[derive(Debug, Default)]
pub struct ClassifyOutcome {
    pub mentions: Vec<DeviceMention>,
    pub issues: Vec<(Option<String>, ReviewIssue)>,
}

pub struct SectionClassifier {
    strategy: Box<dyn SectionStrategy>,
    window_chars: usize,
    ocr_max_corrections: usize,
}

impl SectionClassifier {
    /// Classifier with the keyword-window semantic strategy.
    pub fn new(config: &ReviewConfig) -> Self {
        let strategy = KeywordWindowStrategy::new(config.semantic_window_words, config.semantic_min_hits);
        Self::with_strategy(config, Box::new(strategy))
    }

    pub fn with_strategy(config: &ReviewConfig, strategy: Box<dyn SectionStrategy>) -> Self {
        Self {
            strategy,
            window_chars: config.se_window_chars,
            ocr_max_corrections: config.ocr_max_corrections,
        }
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Locate headings, trying the regex tier before the OCR-tolerant one.
    pub fn analyze(&self, text: &str) -> DocumentSections {
        let exact = scan_lines(text, |line| headings::match_heading(line));
        if !exact.is_empty() {
            return DocumentSections {
                tier: Some(SectionTier::Regex),
                headings: exact,
            };
        }

        let max = self.ocr_max_corrections;
        let corrected = scan_lines(text, |line| {
            let (fixed, count) = ocr_correct(line);
            if count == 0 || count > max {
                return None;
            }
            headings::match_heading(&fixed)
        });
        if !corrected.is_empty() {
            return DocumentSections {
                tier: Some(SectionTier::OcrTolerant),
                headings: corrected,
            };
        }

        DocumentSections::default()
    }

    /// Classify the mention at character `offset` given the document analysis.
    pub fn classify_at(
        &self,
        text: &str,
        sections: &DocumentSections,
        offset: usize,
        from_table: bool,
    ) -> Classified {
        if let Some(tier) = sections.tier {
            let (category, evidence) =
                if let Some(h) = sections.covering(SectionCategory::Se, offset, self.window_chars) {
                    (SectionCategory::Se, Some(h.text.clone()))
                } else if let Some(h) =
                    sections.covering(SectionCategory::Mixed, offset, self.window_chars)
                {
                    (SectionCategory::Mixed, Some(h.text.clone()))
                } else if from_table {
                    (SectionCategory::TableOrImage, None)
                } else {
                    (SectionCategory::General, None)
                };
            return Classified {
                section: SectionMatch {
                    category,
                    tier: Some(tier),
                    low_confidence_section: false,
                    evidence,
                },
                ambiguity: None,
            };
        }

        match self.strategy.classify(text, offset) {
            Some(verdict) => {
                let category = match verdict.category {
                    SectionCategory::General if from_table => SectionCategory::TableOrImage,
                    other => other,
                };
                let ambiguity = verdict
                    .ambiguous
                    .then(|| format!("{} ({})", verdict.evidence, self.strategy.name()));
                Classified {
                    section: SectionMatch {
                        category,
                        tier: Some(SectionTier::Semantic),
                        low_confidence_section: verdict.ambiguous,
                        evidence: Some(verdict.evidence),
                    },
                    ambiguity,
                }
            }
            None => Classified {
                section: SectionMatch::unclassified(),
                ambiguity: None,
            },
        }
    }

    /// Validate identifiers and classify every raw mention.
    ///
    /// Malformed identifiers are dropped with a warning and an issue. Mentions
    /// whose document is not supplied are classified against their own
    /// context window.
    pub fn classify_mentions(&self, raws: &[RawMention], documents: &[SourceDocument]) -> ClassifyOutcome {
        let by_id: HashMap<&str, &SourceDocument> =
            documents.iter().map(|d| (d.document_id.as_str(), d)).collect();
        let mut analyses: HashMap<&str, DocumentSections> = HashMap::new();
        let mut outcome = ClassifyOutcome::default();

        for raw in raws {
            let device_id = match DeviceId::parse(&raw.device_id) {
                Ok(id) => id,
                Err(err) => {
                    warn!(raw = %raw.device_id, document = %raw.document_id, "dropping malformed device id");
                    outcome.issues.push((None, ReviewIssue::from(&err)));
                    continue;
                }
            };

            let classified = match by_id.get(raw.document_id.as_str()) {
                Some(doc) => {
                    let sections = analyses
                        .entry(doc.document_id.as_str())
                        .or_insert_with(|| self.analyze(&doc.text));
                    self.classify_at(&doc.text, sections, raw.offset, raw.from_table)
                }
                None => {
                    let sections = self.analyze(&raw.context);
                    let midpoint = raw.context.chars().count() / 2;
                    self.classify_at(&raw.context, &sections, midpoint, raw.from_table)
                }
            };

            debug!(
                device = %device_id,
                document = %raw.document_id,
                offset = raw.offset,
                category = classified.section.category.as_str(),
                tier = ?classified.section.tier,
                "classified mention"
            );

            if let Some(detail) = classified.ambiguity {
                let err = ReviewError::SectionClassificationAmbiguous {
                    device_id: device_id.to_string(),
                    document_id: raw.document_id.clone(),
                    detail,
                };
                outcome
                    .issues
                    .push((Some(device_id.to_string()), ReviewIssue::from(&err)));
            }

            outcome.mentions.push(DeviceMention {
                device_id,
                document_id: raw.document_id.clone(),
                offset: raw.offset,
                context: raw.context.clone(),
                section: classified.section,
            });
        }

        outcome
    }
}

/// Walk lines, tracking character offsets, collecting lines `matcher` accepts.
fn scan_lines<F>(text: &str, matcher: F) -> Vec<Heading>
where
    F: Fn(&str) -> Option<(SectionCategory, &'static str)>,
{
    let mut found = Vec::new();
    let mut line_start = 0usize;
    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        if let Some((category, label)) = matcher(content) {
            let indent = content.chars().take_while(|c| c.is_whitespace()).count();
            found.push(Heading {
                category,
                label,
                start: line_start + indent,
                text: content.trim().to_string(),
            });
        }
        line_start += line.chars().count();
    }
    found
}

/// Apply the OCR substitution table to characters next to an ASCII letter.
///
/// Returns the corrected line and how many characters changed.
pub fn ocr_correct(line: &str) -> (String, usize) {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut count = 0;
    for (i, &c) in chars.iter().enumerate() {
        let replacement = OCR_SUBSTITUTIONS
            .iter()
            .find(|(from, _)| *from == c)
            .map(|&(_, to)| to);
        let near_letter = (i > 0 && chars[i - 1].is_ascii_alphabetic())
            || chars.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic());
        match replacement {
            Some(to) if near_letter => {
                out.push(to);
                count += 1;
            }
            _ => out.push(c),
        }
    }
    (out, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use predicate_core::DocumentType;

    use crate::strategy::CentroidStrategy;

    fn classifier() -> SectionClassifier {
        SectionClassifier::new(&ReviewConfig::default())
    }

    fn padded(heading: &str, total_chars: usize) -> String {
        let mut text = format!("{heading}\n");
        while text.chars().count() < total_chars {
            text.push_str("lorem ipsum ");
        }
        text
    }

    fn doc(id: &str, text: &str) -> SourceDocument {
        SourceDocument {
            document_id: id.into(),
            device_id: None,
            product_code: None,
            review_panel: None,
            document_type: DocumentType::Summary,
            decision_date: None,
            text: text.into(),
        }
    }

    fn raw(device: &str, document: &str, offset: usize) -> RawMention {
        RawMention {
            device_id: device.into(),
            document_id: document.into(),
            offset,
            context: String::new(),
            from_table: false,
        }
    }

    #[test]
    fn se_window_is_half_open() {
        let c = classifier();
        let text = padded("Substantial Equivalence", 4000);
        let sections = c.analyze(&text);
        assert_eq!(sections.tier, Some(SectionTier::Regex));

        let inside = c.classify_at(&text, &sections, 1999, false);
        assert_eq!(inside.section.category, SectionCategory::Se);
        assert_eq!(inside.section.tier, Some(SectionTier::Regex));

        let edge = c.classify_at(&text, &sections, 2000, false);
        assert_eq!(edge.section.category, SectionCategory::General);

        let outside = c.classify_at(&text, &sections, 2001, false);
        assert_eq!(outside.section.category, SectionCategory::General);
        assert!(!outside.section.low_confidence_section);
    }

    #[test]
    fn window_measured_from_heading_start() {
        let c = classifier();
        let text = format!("{}\n5. Predicate Device\nbody", "x".repeat(99));
        let sections = c.analyze(&text);
        assert_eq!(sections.headings.len(), 1);
        assert_eq!(sections.headings[0].start, 100);
        assert_eq!(
            c.classify_at(&text, &sections, 2099, false).section.category,
            SectionCategory::Se
        );
        assert_eq!(
            c.classify_at(&text, &sections, 2100, false).section.category,
            SectionCategory::General
        );
        assert_eq!(
            c.classify_at(&text, &sections, 50, false).section.category,
            SectionCategory::General
        );
    }

    #[test]
    fn se_beats_mixed_and_mixed_beats_table() {
        let c = classifier();
        let text = "Performance Testing\nresults here\nSubstantial Equivalence\ncompare\n";
        let sections = c.analyze(text);
        assert_eq!(sections.headings.len(), 2);
        // Offset 35 is inside both windows.
        assert_eq!(c.classify_at(text, &sections, 35, true).section.category, SectionCategory::Se);
        // Offset 5 only inside the Mixed window.
        assert_eq!(c.classify_at(text, &sections, 5, true).section.category, SectionCategory::Mixed);
    }

    #[test]
    fn table_mention_outside_windows() {
        let c = classifier();
        let text = padded("Substantial Equivalence", 3000);
        let sections = c.analyze(&text);
        let m = c.classify_at(&text, &sections, 2500, true);
        assert_eq!(m.section.category, SectionCategory::TableOrImage);
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let c = classifier();
        let text = format!("§§§\nSubstantial Equivalence\n{}", "é".repeat(2100));
        let sections = c.analyze(&text);
        assert_eq!(sections.headings[0].start, 4);
        assert_eq!(
            c.classify_at(&text, &sections, 2003, false).section.category,
            SectionCategory::Se
        );
        assert_eq!(
            c.classify_at(&text, &sections, 2004, false).section.category,
            SectionCategory::General
        );
    }

    #[test]
    fn ocr_correction_only_near_letters() {
        assert_eq!(ocr_correct("SUBSTANT1AL EQU1VALENCE"), ("SUBSTANTiAL EQUiVALENCE".into(), 2));
        assert_eq!(ocr_correct("5. Predicate"), ("5. Predicate".into(), 0));
        assert_eq!(ocr_correct("Bio|ogical"), ("Biological".into(), 1));
    }

    #[test]
    fn ocr_tier_used_when_no_exact_heading() {
        let c = classifier();
        let text = "5. SUBSTANT1AL EQU1VALENCE\nThe predicate is K123456.\n";
        let sections = c.analyze(text);
        assert_eq!(sections.tier, Some(SectionTier::OcrTolerant));
        let m = c.classify_at(text, &sections, 40, false);
        assert_eq!(m.section.category, SectionCategory::Se);
        assert_eq!(m.section.tier, Some(SectionTier::OcrTolerant));
    }

    #[test]
    fn ocr_tier_rejects_too_many_corrections() {
        let c = classifier();
        let text = "5UB5TANT1AL EQU1VALENCE\nbody\n";
        assert_eq!(c.analyze(text).tier, None);
    }

    #[test]
    fn exact_heading_suppresses_ocr_tier() {
        let c = classifier();
        let text = "Performance Testing\nbody\nSUBSTANT1AL EQU1VALENCE\nK123456\n";
        let sections = c.analyze(text);
        assert_eq!(sections.tier, Some(SectionTier::Regex));
        assert_eq!(sections.headings.len(), 1);
    }

    #[test]
    fn semantic_tier_when_no_headings() {
        let c = classifier();
        let text = "The subject device is compared with predicate K123456; \
                    technological characteristics are equivalent.";
        let sections = c.analyze(text);
        assert_eq!(sections.tier, None);
        let m = c.classify_at(text, &sections, 45, false);
        assert_eq!(m.section.category, SectionCategory::Se);
        assert_eq!(m.section.tier, Some(SectionTier::Semantic));
        assert!(m.ambiguity.is_none());
    }

    #[test]
    fn nothing_matches_falls_back_to_low_confidence_general() {
        let c = classifier();
        let text = "Lorem ipsum K123456 dolor sit amet.";
        let m = c.classify_at(text, &c.analyze(text), 12, false);
        assert_eq!(m.section, SectionMatch::unclassified());
    }

    #[test]
    fn custom_strategy_is_used() {
        let strategy = CentroidStrategy::build(
            &[(SectionCategory::Mixed, "bench testing sterilization")],
            512,
            50,
            0.3,
        );
        let c = SectionClassifier::with_strategy(&ReviewConfig::default(), Box::new(strategy));
        assert_eq!(c.strategy_name(), "centroid");
        let text = "results of bench testing K123456 and sterilization";
        let sections = c.analyze(text);
        assert_eq!(sections.tier, None);
        let m = c.classify_at(text, &sections, 25, false);
        assert_eq!(m.section.tier, Some(SectionTier::Semantic));
        assert_eq!(m.section.category, SectionCategory::Mixed);
    }

    #[test]
    fn classify_mentions_drops_malformed_and_reports_ties() {
        let c = classifier();
        let docs = vec![
            doc("K250001", &padded("Predicate Device", 500)),
            doc("K250002", "predicate comparison K123456 bench testing"),
        ];
        let raws = vec![
            raw("K123456", "K250001", 30),
            raw("X99", "K250001", 40),
            raw("k123456", "K250002", 22),
        ];
        let outcome = c.classify_mentions(&raws, &docs);
        assert_eq!(outcome.mentions.len(), 2);
        assert_eq!(outcome.mentions[0].section.category, SectionCategory::Se);
        assert_eq!(outcome.mentions[1].device_id.as_str(), "K123456");
        assert_eq!(outcome.mentions[1].section.category, SectionCategory::Mixed);
        assert!(outcome.mentions[1].section.low_confidence_section);

        let codes: Vec<&str> = outcome.issues.iter().map(|(_, i)| i.code.as_str()).collect();
        assert_eq!(codes, vec!["malformed_device_id", "section_classification_ambiguous"]);
        assert_eq!(outcome.issues[1].0.as_deref(), Some("K123456"));
    }

    #[test]
    fn missing_document_uses_context() {
        let c = classifier();
        let mut mention = raw("K123456", "unknown-doc", 9000);
        mention.context = "Substantial Equivalence\nthe predicate K123456 is cited".into();
        let outcome = c.classify_mentions(&[mention], &[]);
        assert_eq!(outcome.mentions[0].section.category, SectionCategory::Se);
        assert_eq!(outcome.mentions[0].offset, 9000);
    }
}
