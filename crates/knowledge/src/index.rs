//! Flat in-memory embedding index.
//!
//! Vectors are L2-normalized on insert and stored row-major in one buffer,
//! so similarity is a plain inner product. Search is exact brute force.
//! Persistence lives in [`crate::snapshot`].

use crate::chunker::validate_chunk_params;
use crate::types::{Fragment, IndexStats, RetrievalResult};
use crate::vector_index::VectorIndex;
use chrono::{DateTime, Utc};
use medintel_core::{AppError, AppResult};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Construction parameters of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    /// Vector dimension, equal to the embedding provider's output
    pub dimension: usize,

    /// Chunk size the stored fragments were produced with
    pub chunk_size: usize,

    /// Chunk overlap the stored fragments were produced with
    pub chunk_overlap: usize,
}

impl IndexConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.dimension == 0 {
            return Err(AppError::Config(
                "Index dimension must be positive".to_string(),
            ));
        }
        validate_chunk_params(self.chunk_size, self.chunk_overlap)
    }
}

/// Exact nearest-neighbor index over unit vectors.
#[derive(Debug, Clone)]
pub struct EmbeddingIndex {
    pub(crate) config: IndexConfig,
    pub(crate) fragments: Vec<Fragment>,
    /// Row-major, `fragments.len() * config.dimension` values
    pub(crate) vectors: Vec<f32>,
    /// Fragment ids in use
    pub(crate) ids: HashSet<String>,
    /// Fragment count per parent document
    pub(crate) documents: HashMap<String, usize>,
    pub(crate) built_at: Option<DateTime<Utc>>,
}

impl EmbeddingIndex {
    /// Create an empty index.
    ///
    /// # Errors
    /// `AppError::Config` for a zero dimension or invalid chunk parameters.
    pub fn new(config: IndexConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            fragments: Vec::new(),
            vectors: Vec::new(),
            ids: HashSet::new(),
            documents: HashMap::new(),
            built_at: None,
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Stored fragments in insertion order.
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Stored (normalized) vector of the fragment at `row`.
    pub fn vector(&self, row: usize) -> Option<&[f32]> {
        let dim = self.config.dimension;
        self.vectors.get(row * dim..(row + 1) * dim)
    }

    /// Next free id for `base`, considering ids already stored and those
    /// reserved earlier in the same batch.
    fn unique_id(&self, base: &str, reserved: &HashSet<String>) -> String {
        let taken = |id: &str| self.ids.contains(id) || reserved.contains(id);
        if !taken(base) {
            return base.to_string();
        }
        let mut n = 1u32;
        loop {
            let candidate = format!("{}-{}", base, n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// L2-normalize `vector`.
///
/// # Errors
/// `AppError::Knowledge` when a component is not finite or the norm is zero.
pub fn normalize(vector: &[f32]) -> AppResult<Vec<f32>> {
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(AppError::Knowledge(
            "Vector contains non-finite values".to_string(),
        ));
    }

    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(AppError::Knowledge("Vector has zero norm".to_string()));
    }

    Ok(vector.iter().map(|x| x / norm).collect())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

impl VectorIndex for EmbeddingIndex {
    fn add(&mut self, fragments: Vec<Fragment>, vectors: Vec<Vec<f32>>) -> AppResult<()> {
        if fragments.len() != vectors.len() {
            return Err(AppError::Knowledge(format!(
                "Fragment/vector count mismatch: {} fragments, {} vectors",
                fragments.len(),
                vectors.len()
            )));
        }

        let dim = self.config.dimension;

        // Validate and normalize everything before touching the index
        let mut staged = Vec::with_capacity(vectors.len() * dim);
        for vector in &vectors {
            if vector.len() != dim {
                return Err(AppError::DimensionMismatch {
                    expected: dim,
                    actual: vector.len(),
                });
            }
            staged.extend(normalize(vector)?);
        }

        let mut reserved = HashSet::with_capacity(fragments.len());
        let mut renamed = 0usize;
        let fragments: Vec<Fragment> = fragments
            .into_iter()
            .map(|mut fragment| {
                let id = self.unique_id(&fragment.fragment_id, &reserved);
                if id != fragment.fragment_id {
                    renamed += 1;
                    fragment.fragment_id = id.clone();
                }
                reserved.insert(id);
                fragment
            })
            .collect();

        if renamed > 0 {
            tracing::debug!("Suffixed {} duplicate fragment ids", renamed);
        }

        for fragment in &fragments {
            *self.documents.entry(fragment.parent_id.clone()).or_insert(0) += 1;
        }
        self.ids.extend(reserved);
        self.vectors.extend(staged);
        self.fragments.extend(fragments);

        Ok(())
    }

    fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> AppResult<Vec<RetrievalResult>> {
        let dim = self.config.dimension;
        if query_vector.len() != dim {
            return Err(AppError::DimensionMismatch {
                expected: dim,
                actual: query_vector.len(),
            });
        }

        if k == 0 || self.fragments.is_empty() {
            return Ok(Vec::new());
        }

        let query = normalize(query_vector)?;

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(dim)
            .enumerate()
            .map(|(row, vector)| (row, dot(&query, vector).clamp(-1.0, 1.0)))
            .filter(|(_, score)| *score >= score_threshold)
            .collect();

        // Stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        tracing::debug!(
            "Retrieved {} fragments (requested top-{}, threshold {:.3})",
            scored.len(),
            k,
            score_threshold
        );

        Ok(scored
            .into_iter()
            .map(|(row, score)| RetrievalResult {
                fragment: self.fragments[row].clone(),
                score,
            })
            .collect())
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            fragment_count: self.fragments.len(),
            unique_document_count: self.documents.len(),
            dimension: self.config.dimension,
            chunk_size: self.config.chunk_size,
            chunk_overlap: self.config.chunk_overlap,
            built_at: self.built_at,
        }
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn save(&self, path: &Path) -> AppResult<()> {
        crate::snapshot::save(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FragmentMetadata;

    fn config(dimension: usize) -> IndexConfig {
        IndexConfig {
            dimension,
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }

    fn fragment(parent: &str, position: u32) -> Fragment {
        Fragment {
            parent_id: parent.to_string(),
            fragment_id: Fragment::id_for(parent, position),
            text: format!("{} fragment {}", parent, position),
            position,
            fragment_count: 1,
            byte_range: (0, 10),
            metadata: FragmentMetadata {
                title: parent.to_string(),
                source: "test".to_string(),
                year: None,
                url: None,
                extra: serde_json::Value::Null,
            },
        }
    }

    #[test]
    fn test_new_rejects_bad_config() {
        assert!(matches!(EmbeddingIndex::new(config(0)), Err(AppError::Config(_))));
        let bad_chunks = IndexConfig {
            dimension: 3,
            chunk_size: 10,
            chunk_overlap: 10,
        };
        assert!(matches!(EmbeddingIndex::new(bad_chunks), Err(AppError::Config(_))));
    }

    #[test]
    fn test_add_normalizes_vectors() {
        let mut index = EmbeddingIndex::new(config(3)).unwrap();
        index
            .add(
                vec![fragment("a", 0), fragment("b", 0)],
                vec![vec![3.0, 4.0, 0.0], vec![0.0, 0.0, 2.5]],
            )
            .unwrap();

        for row in 0..2 {
            let v = index.vector(row).unwrap();
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
        let first = index.vector(0).unwrap();
        assert!((first[0] - 0.6).abs() < 1e-6);
        assert!((first[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_add_length_mismatch() {
        let mut index = EmbeddingIndex::new(config(3)).unwrap();
        let result = index.add(vec![fragment("a", 0)], vec![]);
        assert!(matches!(result, Err(AppError::Knowledge(_))));
    }

    #[test]
    fn test_add_is_all_or_nothing() {
        let mut index = EmbeddingIndex::new(config(3)).unwrap();
        let result = index.add(
            vec![fragment("a", 0), fragment("a", 1), fragment("a", 2)],
            vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0], vec![0.0, 0.0, 1.0]],
        );

        assert!(matches!(
            result,
            Err(AppError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert!(index.is_empty());
        assert_eq!(index.stats().unique_document_count, 0);
    }

    #[test]
    fn test_add_rejects_zero_and_non_finite() {
        let mut index = EmbeddingIndex::new(config(2)).unwrap();
        assert!(index.add(vec![fragment("a", 0)], vec![vec![0.0, 0.0]]).is_err());
        assert!(index
            .add(vec![fragment("a", 0)], vec![vec![f32::NAN, 1.0]])
            .is_err());
        assert!(index
            .add(vec![fragment("a", 0)], vec![vec![f32::INFINITY, 1.0]])
            .is_err());
        assert!(index.is_empty());
    }

    #[test]
    fn test_duplicate_ids_get_suffix() {
        let mut index = EmbeddingIndex::new(config(2)).unwrap();
        index
            .add(vec![fragment("doc", 0)], vec![vec![1.0, 0.0]])
            .unwrap();
        index
            .add(
                vec![fragment("doc", 0), fragment("doc", 0)],
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .unwrap();

        let ids: Vec<&str> = index
            .fragments()
            .iter()
            .map(|f| f.fragment_id.as_str())
            .collect();
        assert_eq!(ids, vec!["doc_chunk_0", "doc_chunk_0-1", "doc_chunk_0-2"]);
        assert_eq!(index.stats().unique_document_count, 1);
    }

    #[test]
    fn test_search_orders_and_filters() {
        let mut index = EmbeddingIndex::new(config(2)).unwrap();
        index
            .add(
                vec![fragment("low", 0), fragment("high", 0), fragment("mid", 0)],
                vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
            )
            .unwrap();

        let results = index.search(&[1.0, 0.0], 10, 0.5).unwrap();
        let parents: Vec<&str> = results.iter().map(|r| r.fragment.parent_id.as_str()).collect();
        assert_eq!(parents, vec!["high", "mid"]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(results.iter().all(|r| r.score >= 0.5));
    }

    #[test]
    fn test_search_ties_keep_insertion_order() {
        let mut index = EmbeddingIndex::new(config(2)).unwrap();
        index
            .add(
                vec![fragment("first", 0), fragment("second", 0), fragment("third", 0)],
                vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]],
            )
            .unwrap();

        let results = index.search(&[1.0, 0.0], 2, -1.0).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].fragment.parent_id, "first");
        assert_eq!(results[1].fragment.parent_id, "second");
    }

    #[test]
    fn test_search_empty_cases() {
        let mut index = EmbeddingIndex::new(config(2)).unwrap();
        assert!(index.search(&[1.0, 0.0], 5, 0.0).unwrap().is_empty());

        index
            .add(vec![fragment("a", 0)], vec![vec![1.0, 0.0]])
            .unwrap();
        assert!(index.search(&[1.0, 0.0], 0, 0.0).unwrap().is_empty());
        assert!(index.search(&[0.0, 1.0], 5, 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_search_wrong_dimension() {
        let index = EmbeddingIndex::new(config(3)).unwrap();
        assert!(matches!(
            index.search(&[1.0, 0.0], 5, 0.0),
            Err(AppError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_stats() {
        let mut index = EmbeddingIndex::new(config(2)).unwrap();
        index
            .add(
                vec![fragment("a", 0), fragment("a", 1), fragment("b", 0)],
                vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
            )
            .unwrap();

        let stats = index.stats();
        assert_eq!(stats.fragment_count, 3);
        assert_eq!(stats.unique_document_count, 2);
        assert_eq!(stats.dimension, 2);
        assert_eq!(stats.chunk_size, 500);
        assert_eq!(stats.chunk_overlap, 50);
    }
}
