//! Answer confidence scoring.

use crate::types::RetrievalResult;

/// Marker whose presence counts as a citation.
const CITATION_MARKER: &str = "[REF_";

const CITATION_BONUS: f32 = 1.1;
const UNCERTAINTY_PENALTY: f32 = 0.7;

/// Phrases by which an answer admits it lacks evidence.
const UNCERTAINTY_PHRASES: [&str; 4] = [
    "don't have enough",
    "cannot answer",
    "insufficient information",
    "not enough verified",
];

/// Derives a `[0, 1]` trust score from retrieval scores and answer text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self
    }

    /// Mean retrieval score, boosted for citations and penalized when the
    /// answer admits uncertainty over weak evidence.
    ///
    /// Any `[REF_` marker earns the citation bonus, whether or not it names
    /// a retrieved fragment.
    pub fn score(
        &self,
        results: &[RetrievalResult],
        answer: &str,
        confidence_threshold: f32,
    ) -> f32 {
        if results.is_empty() {
            return 0.0;
        }

        let base = results.iter().map(|r| r.score).sum::<f32>() / results.len() as f32;
        let mut confidence = base;

        if answer.contains(CITATION_MARKER) {
            confidence *= CITATION_BONUS;
        }

        let lowered = answer.to_lowercase();
        let admits_uncertainty = UNCERTAINTY_PHRASES.iter().any(|p| lowered.contains(p));
        if admits_uncertainty && base < confidence_threshold {
            confidence *= UNCERTAINTY_PENALTY;
        }

        if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}
