//! Ingestion pipeline: chunk, embed in batches, add under one write lock.

use crate::chunker::Chunker;
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::types::{Document, Fragment, IngestStats};
use crate::vector_index::{read_index, write_index, SharedIndex, VectorIndex};
use medintel_core::{AppConfig, AppError, AppResult};
use medintel_llm::CallPolicy;
use std::sync::Arc;
use std::time::Instant;

/// Turns documents into indexed fragments.
#[derive(Debug)]
pub struct Ingestor {
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    policy: CallPolicy,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn EmbeddingProvider>,
        policy: CallPolicy,
        batch_size: usize,
    ) -> AppResult<Self> {
        if batch_size == 0 {
            return Err(AppError::Config(
                "Embedding batch size must be positive".to_string(),
            ));
        }

        Ok(Self {
            chunker,
            embedder,
            policy,
            batch_size,
        })
    }

    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let chunker = Chunker::new(config.index.chunk_size, config.index.chunk_overlap)?;
        let embedder = create_provider(&config.embedding)?;
        Self::new(
            chunker,
            embedder,
            CallPolicy::from_settings(&config.runtime),
            config.embedding.batch_size,
        )
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Chunk and embed `documents`, then append every fragment to `index`.
    ///
    /// Nothing is added unless every batch embedded successfully.
    #[tracing::instrument(skip(self, index, documents), fields(documents = documents.len()))]
    pub async fn ingest(
        &self,
        index: &SharedIndex,
        documents: Vec<Document>,
    ) -> AppResult<IngestStats> {
        let start = Instant::now();

        let built_with = read_index(index)?.stats();
        if self.embedder.dimensions() != built_with.dimension {
            return Err(AppError::DimensionMismatch {
                expected: built_with.dimension,
                actual: self.embedder.dimensions(),
            });
        }
        if self.chunker.chunk_size() != built_with.chunk_size
            || self.chunker.chunk_overlap() != built_with.chunk_overlap
        {
            return Err(AppError::Config(format!(
                "Index was built with chunk size {} and overlap {}, chunker uses {} and {}",
                built_with.chunk_size,
                built_with.chunk_overlap,
                self.chunker.chunk_size(),
                self.chunker.chunk_overlap()
            )));
        }

        let mut stats = IngestStats::default();
        let mut fragments: Vec<Fragment> = Vec::new();
        for document in &documents {
            let pieces = self.chunker.split(document);
            if pieces.is_empty() {
                tracing::warn!("Document {} produced no fragments, skipping", document.id);
                continue;
            }
            stats.documents += 1;
            stats.bytes += document.text.len() as u64;
            fragments.extend(pieces);
        }

        tracing::info!(
            "Chunked {} documents into {} fragments",
            stats.documents,
            fragments.len()
        );

        let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        let batches = texts.len().div_ceil(self.batch_size);
        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            let embedder = &self.embedder;
            let embedded = self
                .policy
                .run("fragment embedding", || embedder.embed_batch(batch))
                .await?;

            if embedded.len() != batch.len() {
                return Err(AppError::Embedding(format!(
                    "Provider returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                )));
            }

            vectors.extend(embedded);
            tracing::debug!("Embedded batch {}/{}", i + 1, batches);
        }

        stats.fragments = fragments.len();
        {
            let mut guard = write_index(index)?;
            guard.add(fragments, vectors)?;
        }

        stats.duration_secs = start.elapsed().as_secs_f64();
        tracing::info!(
            "Ingested {} documents, {} fragments, {} bytes in {:.2}s",
            stats.documents,
            stats.fragments,
            stats.bytes,
            stats.duration_secs
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::trigram::TrigramProvider;
    use crate::index::{EmbeddingIndex, IndexConfig};
    use crate::vector_index::share;

    fn shared_index(dimension: usize) -> SharedIndex {
        share(
            EmbeddingIndex::new(IndexConfig {
                dimension,
                chunk_size: 100,
                chunk_overlap: 10,
            })
            .unwrap(),
        )
    }

    fn ingestor(dimension: usize, batch_size: usize) -> Ingestor {
        Ingestor::new(
            Chunker::new(100, 10).unwrap(),
            Arc::new(TrigramProvider::new(dimension)),
            CallPolicy::default(),
            batch_size,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_ingest_counts_and_indexes() {
        let index = shared_index(32);
        let docs = vec![
            Document::new("Long", "test", "Hypertension management. ".repeat(20)),
            Document::new("Short", "test", "Insulin lowers glucose."),
            Document::new("Empty", "test", ""),
        ];
        let total_bytes = docs.iter().map(|d| d.text.len() as u64).sum::<u64>();

        let stats = ingestor(32, 3).ingest(&index, docs).await.unwrap();

        assert_eq!(stats.documents, 2);
        assert!(stats.fragments > 2);
        assert_eq!(stats.bytes, total_bytes);

        let index_stats = read_index(&index).unwrap().stats();
        assert_eq!(index_stats.fragment_count, stats.fragments);
        assert_eq!(index_stats.unique_document_count, 2);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = shared_index(32);
        let docs = vec![Document::new("T", "S", "Some text")];

        let result = ingestor(16, 8).ingest(&index, docs).await;
        assert!(matches!(
            result,
            Err(AppError::DimensionMismatch {
                expected: 32,
                actual: 16
            })
        ));
        assert!(read_index(&index).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chunking_mismatch_rejected() {
        let index = shared_index(32);
        let ingestor = Ingestor::new(
            Chunker::new(60, 10).unwrap(),
            Arc::new(TrigramProvider::new(32)),
            CallPolicy::default(),
            8,
        )
        .unwrap();

        let result = ingestor
            .ingest(&index, vec![Document::new("T", "S", "Some text")])
            .await;
        assert!(matches!(result, Err(AppError::Config(_))));
        assert!(read_index(&index).unwrap().is_empty());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = Ingestor::new(
            Chunker::new(100, 10).unwrap(),
            Arc::new(TrigramProvider::new(8)),
            CallPolicy::default(),
            0,
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
