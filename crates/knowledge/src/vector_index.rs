//! Vector index abstraction for fragments.
//!
//! Defines the seam behind which the flat index could be swapped for an
//! approximate one without touching retrieval or ingestion.

use crate::types::{Fragment, IndexStats, RetrievalResult};
use medintel_core::{AppError, AppResult};
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Trait for vector index backends.
///
/// Implementations must support:
/// - Appending fragments with their embeddings (all-or-nothing)
/// - Searching for the top-k most similar fragments above a threshold
/// - Reporting statistics
/// - Persisting a snapshot
pub trait VectorIndex: Send + Sync {
    /// Append fragments with their vectors.
    ///
    /// Either every pair is stored or, on error, nothing is.
    fn add(&mut self, fragments: Vec<Fragment>, vectors: Vec<Vec<f32>>) -> AppResult<()>;

    /// Search for at most `k` fragments scoring at least `score_threshold`.
    ///
    /// Returns results ordered by descending score, ties in insertion order.
    fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> AppResult<Vec<RetrievalResult>>;

    /// Get statistics about the index.
    fn stats(&self) -> IndexStats;

    /// Vector dimension accepted by this index.
    fn dimension(&self) -> usize;

    /// Persist the index to `path`, replacing any previous snapshot.
    fn save(&self, path: &Path) -> AppResult<()>;

    /// Number of stored fragments.
    fn len(&self) -> usize {
        self.stats().fragment_count
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Index handle shared between ingestion (single writer) and queries
/// (many readers).
pub type SharedIndex = Arc<RwLock<dyn VectorIndex>>;

/// Wrap an index for shared access.
pub fn share<I: VectorIndex + 'static>(index: I) -> SharedIndex {
    Arc::new(RwLock::new(index))
}

/// Take the read lock, surfacing poisoning as a knowledge error.
pub fn read_index(index: &SharedIndex) -> AppResult<RwLockReadGuard<'_, dyn VectorIndex + 'static>> {
    index
        .read()
        .map_err(|_| AppError::Knowledge("Index lock poisoned".to_string()))
}

/// Take the write lock, surfacing poisoning as a knowledge error.
pub fn write_index(index: &SharedIndex) -> AppResult<RwLockWriteGuard<'_, dyn VectorIndex + 'static>> {
    index
        .write()
        .map_err(|_| AppError::Knowledge("Index lock poisoned".to_string()))
}
