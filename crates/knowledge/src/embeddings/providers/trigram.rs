//! Hashing embedding provider for offline use.

use crate::embeddings::provider::EmbeddingProvider;
use medintel_core::AppResult;
use std::collections::{HashMap, HashSet};

const STOP_WORDS: [&str; 33] = [
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what",
];

/// Deterministic embeddings from hashed word trigrams.
///
/// Each content word contributes its character trigrams and the whole word
/// to hashed dimensions. Not semantic, but stable and content-dependent,
/// which is what offline runs and tests need. Non-empty text never maps to
/// the zero vector.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
    stop_words: HashSet<&'static str>,
}

impl TrigramProvider {
    /// Create a new trigram provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    fn hash(bytes: &[u8], multiplier: u64) -> u64 {
        bytes
            .iter()
            .fold(0u64, |acc, &b| acc.wrapping_mul(multiplier).wrapping_add(b as u64))
    }

    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();

        let mut word_freq: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2 && !self.stop_words.contains(*w))
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let dim = (Self::hash(trigram.as_bytes(), 37) as usize) % self.dimensions;
                embedding[dim] += (*freq as f32).sqrt();
            }

            let dim = (Self::hash(word.as_bytes(), 31) as usize) % self.dimensions;
            embedding[dim] += *freq as f32;
        }

        // Short or stop-word-only text still gets a direction of its own
        if word_freq.is_empty() && !text.is_empty() {
            let dim = (Self::hash(text.as_bytes(), 31) as usize) % self.dimensions;
            embedding[dim] = 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.generate_embedding(text)).collect())
    }
}
