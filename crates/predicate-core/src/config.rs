//! Review thresholds and classifier tunables.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for one review session. Every field has a default, so a partial
/// JSON file overrides only what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Adjusted score at or above this accepts.
    pub accept_threshold: u32,
    /// Adjusted score below this rejects.
    pub defer_floor: u32,
    /// Points removed for a YELLOW web validation.
    pub yellow_penalty: u32,
    /// Characters after an SE heading start that count as SE context.
    pub se_window_chars: usize,
    /// Words either side of a mention scanned by the semantic tier.
    pub semantic_window_words: usize,
    /// Keyword hits a category needs in the semantic window.
    pub semantic_min_hits: usize,
    /// Corrected characters allowed per OCR-tolerant heading candidate.
    pub ocr_max_corrections: usize,
    /// Adverse-event count treated as a moderate history.
    pub maude_moderate_events: u32,
    /// Adverse-event count that raises HIGH_MAUDE.
    pub maude_high_events: u32,
    /// Clearance age (years) beyond which OLD is raised.
    pub old_after_years: u32,
    /// Downgrade an Accept to Defer when enrichment was incomplete.
    pub defer_on_incomplete_enrichment: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 70,
            defer_floor: 40,
            yellow_penalty: 10,
            se_window_chars: 2000,
            semantic_window_words: 200,
            semantic_min_hits: 2,
            ocr_max_corrections: 2,
            maude_moderate_events: 10,
            maude_high_events: 100,
            old_after_years: 10,
            defer_on_incomplete_enrichment: true,
        }
    }
}

impl ReviewConfig {
    /// Load a JSON config file and validate it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded review config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accept_threshold > 100 {
            return Err(ConfigError::Invalid(format!(
                "accept_threshold {} exceeds 100",
                self.accept_threshold
            )));
        }
        if self.defer_floor >= self.accept_threshold {
            return Err(ConfigError::Invalid(format!(
                "defer_floor {} must be below accept_threshold {}",
                self.defer_floor, self.accept_threshold
            )));
        }
        if self.se_window_chars == 0 || self.semantic_window_words == 0 {
            return Err(ConfigError::Invalid("window sizes must be non-zero".into()));
        }
        if self.semantic_min_hits == 0 {
            return Err(ConfigError::Invalid("semantic_min_hits must be at least 1".into()));
        }
        if self.maude_moderate_events > self.maude_high_events {
            return Err(ConfigError::Invalid(format!(
                "maude_moderate_events {} exceeds maude_high_events {}",
                self.maude_moderate_events, self.maude_high_events
            )));
        }
        Ok(())
    }
}
