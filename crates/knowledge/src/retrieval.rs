//! Query-time retrieval: embed the question, search the shared index.

use crate::embeddings::EmbeddingProvider;
use crate::index::normalize;
use crate::types::RetrievalResult;
use crate::vector_index::{read_index, SharedIndex, VectorIndex};
use medintel_core::{AppError, AppResult};
use medintel_llm::CallPolicy;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Ranked results of one retrieval together with its wall-clock latency.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub results: Vec<RetrievalResult>,
    pub elapsed: Duration,
}

/// Embeds queries and searches the index.
#[derive(Clone)]
pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    index: SharedIndex,
    policy: CallPolicy,
}

impl RetrievalEngine {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: SharedIndex, policy: CallPolicy) -> Self {
        Self {
            embedder,
            index,
            policy,
        }
    }

    /// Shared handle to the index this engine searches.
    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    /// Retrieve at most `top_k` fragments scoring at least `score_threshold`.
    ///
    /// A query whose embedding has no direction matches nothing and yields
    /// an empty result set. Non-finite embedding components are an
    /// `AppError::Embedding`.
    #[tracing::instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: f32,
    ) -> AppResult<Retrieval> {
        if query.trim().is_empty() {
            return Err(AppError::Knowledge("Query must not be empty".to_string()));
        }

        let start = Instant::now();

        let embedder = &self.embedder;
        let raw = self
            .policy
            .run("query embedding", || embedder.embed(query))
            .await?;

        let dimension = read_index(&self.index)?.dimension();
        if raw.len() != dimension {
            return Err(AppError::DimensionMismatch {
                expected: dimension,
                actual: raw.len(),
            });
        }

        if raw.iter().any(|v| !v.is_finite()) {
            return Err(AppError::Embedding(
                "Query embedding contains non-finite values".to_string(),
            ));
        }

        let query_vector = match normalize(&raw) {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(error = %e, "Query embedding has zero norm, returning no results");
                return Ok(Retrieval {
                    results: Vec::new(),
                    elapsed: start.elapsed(),
                });
            }
        };

        // Guard is dropped at the end of the statement; no await follows while held
        let results = read_index(&self.index)?.search(&query_vector, top_k, score_threshold)?;

        let elapsed = start.elapsed();
        tracing::debug!(
            results = results.len(),
            top_score = results.first().map(|r| r.score),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Retrieval finished"
        );

        Ok(Retrieval { results, elapsed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::trigram::TrigramProvider;
    use crate::index::{EmbeddingIndex, IndexConfig};
    use crate::types::{Fragment, FragmentMetadata};
    use crate::vector_index::{share, write_index};

    fn fragment(id: &str, text: &str) -> Fragment {
        Fragment {
            parent_id: id.to_string(),
            fragment_id: Fragment::id_for(id, 0),
            text: text.to_string(),
            position: 0,
            fragment_count: 1,
            byte_range: (0, text.len()),
            metadata: FragmentMetadata {
                title: id.to_string(),
                source: "test".to_string(),
                year: None,
                url: None,
                extra: serde_json::Value::Null,
            },
        }
    }

    async fn engine_with(texts: &[&str]) -> RetrievalEngine {
        let provider = Arc::new(TrigramProvider::new(64));
        let index = share(
            EmbeddingIndex::new(IndexConfig {
                dimension: 64,
                chunk_size: 500,
                chunk_overlap: 50,
            })
            .unwrap(),
        );

        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let vectors = provider.embed_batch(&owned).await.unwrap();
        let fragments = texts
            .iter()
            .enumerate()
            .map(|(i, t)| fragment(&format!("doc{}", i), t))
            .collect();
        write_index(&index).unwrap().add(fragments, vectors).unwrap();

        RetrievalEngine::new(provider, index, CallPolicy::default())
    }

    #[tokio::test]
    async fn test_retrieve_ranks_matching_fragment_first() {
        let engine = engine_with(&[
            "Fractures heal with immobilization",
            "Diabetes symptoms include thirst and frequent urination",
        ])
        .await;

        let retrieval = engine.retrieve("diabetes symptoms", 2, -1.0).await.unwrap();
        assert_eq!(retrieval.results.len(), 2);
        assert_eq!(retrieval.results[0].fragment.parent_id, "doc1");
        assert!(retrieval.results[0].score >= retrieval.results[1].score);
    }

    #[tokio::test]
    async fn test_retrieve_applies_threshold() {
        let engine = engine_with(&["Diabetes symptoms include thirst"]).await;
        let retrieval = engine.retrieve("diabetes", 5, 1.01).await.unwrap();
        assert!(retrieval.results.is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let engine = engine_with(&["anything at all"]).await;
        let result = engine.retrieve("   ", 5, 0.0).await;
        assert!(matches!(result, Err(AppError::Knowledge(_))));
    }

    #[derive(Debug)]
    struct ConstantEmbedder(f32);

    #[async_trait::async_trait]
    impl EmbeddingProvider for ConstantEmbedder {
        fn provider_name(&self) -> &str {
            "constant"
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![self.0; 64]).collect())
        }

        fn dimensions(&self) -> usize {
            64
        }

        fn model_name(&self) -> &str {
            "constant"
        }
    }

    #[tokio::test]
    async fn test_non_finite_query_embedding_is_an_error() {
        let engine = engine_with(&["Diabetes symptoms include thirst"]).await;
        for value in [f32::NAN, f32::INFINITY] {
            let broken = RetrievalEngine::new(
                Arc::new(ConstantEmbedder(value)),
                engine.index().clone(),
                CallPolicy::default(),
            );
            let result = broken.retrieve("diabetes", 5, -1.0).await;
            assert!(matches!(result, Err(AppError::Embedding(_))));
        }
    }

    #[tokio::test]
    async fn test_zero_query_embedding_returns_nothing() {
        let engine = engine_with(&["Diabetes symptoms include thirst"]).await;
        let zero = RetrievalEngine::new(
            Arc::new(ConstantEmbedder(0.0)),
            engine.index().clone(),
            CallPolicy::default(),
        );
        let retrieval = zero.retrieve("diabetes", 5, -1.0).await.unwrap();
        assert!(retrieval.results.is_empty());
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let engine = engine_with(&[]).await;
        let retrieval = engine.retrieve("hypertension", 5, -1.0).await.unwrap();
        assert!(retrieval.results.is_empty());
    }
}
