//! Semantic-tier strategies.
//!
//! The third classifier tier runs only when a document has no recognisable
//! heading at all. It is pluggable: [`KeywordWindowStrategy`] is the
//! deterministic default, [`CentroidStrategy`] a statistical alternative built
//! from labelled exemplar passages. Both implement [`SectionStrategy`].

use std::collections::HashMap;

use predicate_core::SectionCategory;

use crate::headings::{self, HEADING_VARIANTS};

/// A strategy's answer for one mention.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyVerdict {
    pub category: SectionCategory,
    /// What decided it (variant heading, keyword counts, similarity).
    pub evidence: String,
    /// More than one category qualified equally; `category` is the most
    /// conservative of them.
    pub ambiguous: bool,
}

/// Content-based section classification for documents without headings.
pub trait SectionStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Classify the mention at character `offset` of `text`.
    ///
    /// `None` means the strategy found no usable signal.
    fn classify(&self, text: &str, offset: usize) -> Option<StrategyVerdict>;
}

// ── Keyword window ──

/// Deterministic default: variant-heading lookup, then keyword counting in a
/// ±N word window.
pub struct KeywordWindowStrategy {
    window_words: usize,
    min_hits: usize,
}

impl KeywordWindowStrategy {
    pub fn new(window_words: usize, min_hits: usize) -> Self {
        Self {
            window_words,
            min_hits,
        }
    }

    /// Nearest preceding line that matches a variant heading, provided it
    /// lies inside the word window.
    fn preceding_variant(&self, text: &str, offset: usize) -> Option<(&'static str, SectionCategory)> {
        let byte = byte_offset(text, offset);
        let before = &text[..byte];
        let mut words_seen = 0usize;
        for line in before.lines().rev() {
            if let Some(hit) = headings::match_variant(line) {
                return Some(hit);
            }
            words_seen += line.split_whitespace().count();
            if words_seen > self.window_words {
                break;
            }
        }
        None
    }
}

impl Default for KeywordWindowStrategy {
    fn default() -> Self {
        Self::new(200, 2)
    }
}

impl SectionStrategy for KeywordWindowStrategy {
    fn name(&self) -> &str {
        "keyword-window"
    }

    fn classify(&self, text: &str, offset: usize) -> Option<StrategyVerdict> {
        if let Some((variant, category)) = self.preceding_variant(text, offset) {
            return Some(StrategyVerdict {
                category,
                evidence: format!("variant heading \"{variant}\""),
                ambiguous: false,
            });
        }

        let words = word_window(text, offset, self.window_words);
        let counts: Vec<(SectionCategory, usize)> = [SectionCategory::Se, SectionCategory::Mixed]
            .into_iter()
            .map(|category| (category, keyword_hits(&words, headings::keywords_for(category))))
            .filter(|&(_, hits)| hits >= self.min_hits)
            .collect();

        let best = counts.iter().map(|&(_, hits)| hits).max()?;
        let leaders: Vec<SectionCategory> = counts
            .iter()
            .filter(|&&(_, hits)| hits == best)
            .map(|&(category, _)| category)
            .collect();
        let category = SectionCategory::most_conservative(leaders.iter().copied())?;

        let evidence = counts
            .iter()
            .map(|(category, hits)| format!("{}={hits}", category.as_str()))
            .collect::<Vec<_>>()
            .join(", ");

        Some(StrategyVerdict {
            category,
            evidence: format!("keyword hits {evidence}"),
            ambiguous: leaders.len() > 1,
        })
    }
}

/// Count words whose lower-cased form starts with any stem. Each word counts
/// at most once.
fn keyword_hits(words: &[String], stems: &[&str]) -> usize {
    words
        .iter()
        .filter(|w| stems.iter().any(|stem| w.starts_with(stem)))
        .count()
}

// ── Centroid ──

/// Statistical strategy: hashed bag-of-words vectors compared against one
/// centroid per category by cosine similarity.
pub struct CentroidStrategy {
    centroids: HashMap<SectionCategory, Vec<f32>>,
    dim: usize,
    window_words: usize,
    min_similarity: f32,
    /// Runner-up within this margin of the best makes the result ambiguous.
    tie_margin: f32,
}

impl CentroidStrategy {
    /// Build centroids from labelled exemplar passages.
    pub fn build(
        exemplars: &[(SectionCategory, &str)],
        dim: usize,
        window_words: usize,
        min_similarity: f32,
    ) -> Self {
        let mut accum: HashMap<SectionCategory, (Vec<f32>, usize)> = HashMap::new();
        for &(category, passage) in exemplars {
            let vector = embed(passage, dim);
            let entry = accum
                .entry(category)
                .or_insert_with(|| (vec![0.0f32; dim], 0));
            for (acc, &val) in entry.0.iter_mut().zip(&vector) {
                *acc += val;
            }
            entry.1 += 1;
        }

        let mut centroids = HashMap::with_capacity(accum.len());
        for (category, (mut sum, count)) in accum {
            if count > 0 {
                for v in &mut sum {
                    *v /= count as f32;
                }
                normalize(&mut sum);
                centroids.insert(category, sum);
            }
        }

        Self {
            centroids,
            dim,
            window_words,
            min_similarity,
            tie_margin: 0.02,
        }
    }

    /// Centroids seeded from the heading variant table and keyword stems.
    pub fn with_builtin_exemplars(window_words: usize) -> Self {
        let mut exemplars: Vec<(SectionCategory, &str)> = HEADING_VARIANTS
            .iter()
            .map(|&(variant, category)| (category, variant))
            .collect();
        exemplars.extend(BUILTIN_PASSAGES.iter().copied());
        Self::build(&exemplars, 256, window_words, 0.2)
    }

    pub fn category_count(&self) -> usize {
        self.centroids.len()
    }
}

const BUILTIN_PASSAGES: &[(SectionCategory, &str)] = &[
    (
        SectionCategory::Se,
        "the subject device is substantially equivalent to the predicate device; \
         technological characteristics and intended use are compared and differences \
         do not raise new questions of safety and effectiveness",
    ),
    (
        SectionCategory::Se,
        "comparison table of subject and predicate devices showing identical indications, \
         similar materials and equivalent performance specifications",
    ),
    (
        SectionCategory::Mixed,
        "bench testing and performance testing were conducted; biocompatibility, \
         sterilization validation and software verification studies support the device",
    ),
    (
        SectionCategory::Mixed,
        "clinical study results and non-clinical test data demonstrate the device performs \
         as intended",
    ),
    (
        SectionCategory::General,
        "the device consists of a handheld unit and a charging base and is intended to be \
         used by trained healthcare professionals in a clinical environment",
    ),
];

impl SectionStrategy for CentroidStrategy {
    fn name(&self) -> &str {
        "centroid"
    }

    fn classify(&self, text: &str, offset: usize) -> Option<StrategyVerdict> {
        let words = word_window(text, offset, self.window_words);
        if words.is_empty() {
            return None;
        }
        let vector = embed(&words.join(" "), self.dim);

        let mut scored: Vec<(SectionCategory, f32)> = self
            .centroids
            .iter()
            .map(|(category, centroid)| (*category, cosine_sim(&vector, centroid)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let &(_, best) = scored.first()?;
        if best < self.min_similarity {
            return None;
        }
        let close: Vec<SectionCategory> = scored
            .iter()
            .filter(|&&(_, sim)| best - sim <= self.tie_margin)
            .map(|&(category, _)| category)
            .collect();
        let category = SectionCategory::most_conservative(close.iter().copied())?;

        Some(StrategyVerdict {
            category,
            evidence: format!("centroid similarity {best:.3}"),
            ambiguous: close.len() > 1,
        })
    }
}

/// Hashed term-frequency vector, L2-normalised.
fn embed(text: &str, dim: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dim.max(1)];
    for token in tokenize(text) {
        let bucket = (fnv1a(token.as_bytes()) % vector.len() as u64) as usize;
        vector[bucket] += 1.0;
    }
    normalize(&mut vector);
    vector
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// L2-normalize a vector in place.
fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

// ── Text helpers ──

/// Lower-cased alphanumeric tokens.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Byte index of character `offset`, clamped to the end of `text`.
pub(crate) fn byte_offset(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(b, _)| b)
        .unwrap_or(text.len())
}

/// Up to `radius` words either side of character `offset`, lower-cased and
/// stripped of punctuation.
pub(crate) fn word_window(text: &str, offset: usize, radius: usize) -> Vec<String> {
    let byte = byte_offset(text, offset);
    let (before, after) = text.split_at(byte);
    let mut words: Vec<String> = before
        .split_whitespace()
        .rev()
        .take(radius)
        .flat_map(tokenize)
        .collect();
    words.reverse();
    words.extend(after.split_whitespace().take(radius + 1).flat_map(tokenize));
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler(n: usize) -> String {
        vec!["lorem"; n].join(" ")
    }

    #[test]
    fn keyword_window_finds_se_passage() {
        let text = "The subject device and the predicate K123456 share technological \
                    characteristics; the comparison shows they are substantially equivalent.";
        let verdict = KeywordWindowStrategy::default().classify(text, 30).unwrap();
        assert_eq!(verdict.category, SectionCategory::Se);
        assert!(!verdict.ambiguous);
    }

    #[test]
    fn keyword_window_needs_two_hits() {
        let text = format!("{} predicate K123456 {}", filler(50), filler(50));
        let offset = filler(50).len() + 1;
        assert!(KeywordWindowStrategy::default().classify(&text, offset).is_none());
    }

    #[test]
    fn keyword_window_ignores_hits_outside_radius() {
        let text = format!(
            "predicate equivalence comparison {} K123456 {}",
            filler(300),
            filler(10)
        );
        let offset = text.find("K123456").unwrap();
        assert!(KeywordWindowStrategy::default().classify(&text, offset).is_none());
    }

    #[test]
    fn keyword_tie_resolves_to_conservative_category() {
        let text = "predicate comparison K123456 bench testing";
        let verdict = KeywordWindowStrategy::default().classify(text, 22).unwrap();
        assert_eq!(verdict.category, SectionCategory::Mixed);
        assert!(verdict.ambiguous);
    }

    #[test]
    fn variant_heading_takes_precedence() {
        let text = "Equivalent Device\nThe device K123456 is described here.";
        let offset = text.find("K123456").unwrap();
        let verdict = KeywordWindowStrategy::default().classify(text, offset).unwrap();
        assert_eq!(verdict.category, SectionCategory::Se);
        assert!(verdict.evidence.contains("equivalent device"));
    }

    #[test]
    fn variant_heading_beyond_window_is_ignored() {
        let text = format!("Equivalent Device\n{}\nK123456 lorem", filler(400));
        let offset = text.find("K123456").unwrap();
        assert!(KeywordWindowStrategy::default().classify(&text, offset).is_none());
    }

    #[test]
    fn word_window_respects_radius() {
        let text = "a b c d e f g";
        let words = word_window(text, 6, 2);
        assert_eq!(words, vec!["b", "c", "d", "e", "f"]);
    }

    #[test]
    fn byte_offset_handles_multibyte() {
        let text = "§§ K123456";
        assert_eq!(byte_offset(text, 3), "§§ ".len());
        assert_eq!(byte_offset(text, 999), text.len());
    }

    fn small_centroids() -> CentroidStrategy {
        CentroidStrategy::build(
            &[
                (SectionCategory::Se, "predicate equivalent comparison technological"),
                (SectionCategory::Se, "predicate equivalence similarities"),
                (SectionCategory::Mixed, "bench testing biocompatibility sterilization"),
                (SectionCategory::General, "handheld unit charging base"),
            ],
            1024,
            200,
            0.3,
        )
    }

    #[test]
    fn centroid_picks_closest_category() {
        let strategy = small_centroids();
        assert_eq!(strategy.category_count(), 3);

        let verdict = strategy
            .classify("predicate technological comparison", 5)
            .unwrap();
        assert_eq!(verdict.category, SectionCategory::Se);
        assert!(!verdict.ambiguous);

        let verdict = strategy
            .classify("bench testing sterilization", 5)
            .unwrap();
        assert_eq!(verdict.category, SectionCategory::Mixed);
    }

    #[test]
    fn builtin_centroids_cover_three_categories() {
        let strategy = CentroidStrategy::with_builtin_exemplars(200);
        assert_eq!(strategy.category_count(), 3);
    }

    #[test]
    fn centroid_below_threshold_is_none() {
        let strategy = CentroidStrategy::build(
            &[(SectionCategory::Se, "predicate equivalence")],
            64,
            200,
            0.9,
        );
        assert!(strategy.classify("zebra quartz", 0).is_none());
    }

    #[test]
    fn centroid_empty_text_is_none() {
        let strategy = CentroidStrategy::with_builtin_exemplars(200);
        assert!(strategy.classify("", 0).is_none());
    }
}
