//! Fusion score extraction
//!
//! The prompt asks the model to finish with `{"fusion_score": N}`. Parsing
//! tries that structured line first, then a labeled `Fusion Score: N` in the
//! prose, and finally falls back to [`FALLBACK_SCORE`]. Every fallback is
//! logged and counted so silent defaults show up in monitoring.
//!
//! Scores are clamped to 0-100.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Canonical score when no score can be found in the analysis text
pub const FALLBACK_SCORE: u8 = 0;

/// Upper bound of the score range
pub const MAX_SCORE: u8 = 100;

static STRUCTURED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""fusion_score"\s*:\s*"?(\d+)"#).expect("structured score pattern is valid")
});

// Tolerates Markdown emphasis between label and value ("**Fusion Score:** 85/100")
static LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)fusion[ _-]?score[*_:=\s]*(\d+)").expect("labeled score pattern is valid")
});

/// Where a score came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// `{"fusion_score": N}` line
    Structured,
    /// `Fusion Score: N` in prose
    Labeled,
    /// Nothing recognizable; default used
    Fallback,
}

/// Extracted score and its provenance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreOutcome {
    pub score: u8,
    pub source: ScoreSource,
}

/// Score extractor with an observable fallback counter
#[derive(Debug)]
pub struct ScoreExtractor {
    fallback: u8,
    fallbacks: AtomicU64,
}

impl Default for ScoreExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreExtractor {
    pub fn new() -> Self {
        Self {
            fallback: FALLBACK_SCORE,
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Override the fallback default (clamped to 0-100)
    pub fn with_fallback(mut self, fallback: u8) -> Self {
        self.fallback = fallback.min(MAX_SCORE);
        self
    }

    /// Score for `text`; never fails
    pub fn extract(&self, text: &str) -> u8 {
        self.evaluate(text).score
    }

    /// Score for `text` together with how it was found
    pub fn evaluate(&self, text: &str) -> ScoreOutcome {
        // Last structured line wins: the contract puts it at the very end
        if let Some(score) = STRUCTURED
            .captures_iter(text)
            .last()
            .map(|caps| clamp_digits(&caps[1]))
        {
            return ScoreOutcome {
                score,
                source: ScoreSource::Structured,
            };
        }

        if let Some(caps) = LABELED.captures(text) {
            return ScoreOutcome {
                score: clamp_digits(&caps[1]),
                source: ScoreSource::Labeled,
            };
        }

        let total = self.fallbacks.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            fallback_score = self.fallback,
            fallback_total = total,
            text_chars = text.len(),
            "No fusion score found in analysis, using fallback"
        );
        ScoreOutcome {
            score: self.fallback,
            source: ScoreSource::Fallback,
        }
    }

    /// Number of analyses scored with the fallback so far
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    pub fn fallback_score(&self) -> u8 {
        self.fallback
    }
}

/// Digits only, so a parse failure means overflow
fn clamp_digits(digits: &str) -> u8 {
    digits
        .parse::<u64>()
        .map(|value| value.min(MAX_SCORE as u64) as u8)
        .unwrap_or(MAX_SCORE)
}
