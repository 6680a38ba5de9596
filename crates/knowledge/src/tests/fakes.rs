//! In-crate fake capabilities for end-to-end tests.

use crate::embeddings::EmbeddingProvider;
use medintel_core::{AppError, AppResult};
use medintel_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Returns the vector of the first needle contained in the text, else the
/// fallback vector.
#[derive(Debug)]
pub struct FixedEmbedder {
    dimension: usize,
    table: Vec<(String, Vec<f32>)>,
    fallback: Vec<f32>,
    pub calls: AtomicUsize,
}

impl FixedEmbedder {
    pub fn new(dimension: usize, fallback: Vec<f32>) -> Self {
        Self {
            dimension,
            table: Vec::new(),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, needle: &str, vector: Vec<f32>) -> Self {
        self.table.push((needle.to_string(), vector));
        self
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        self.table
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for FixedEmbedder {
    fn provider_name(&self) -> &str {
        "fixed"
    }

    fn model_name(&self) -> &str {
        "fixed"
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

/// Embedder whose every call fails.
#[derive(Debug)]
pub struct BrokenEmbedder;

#[async_trait::async_trait]
impl EmbeddingProvider for BrokenEmbedder {
    fn provider_name(&self) -> &str {
        "broken"
    }

    fn model_name(&self) -> &str {
        "broken"
    }

    fn dimensions(&self) -> usize {
        3
    }

    async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Err(AppError::Embedding("model not loaded".to_string()))
    }
}

/// How a [`FakeLlm`] behaves on each call.
#[derive(Debug, Clone)]
pub enum Behavior {
    Answer(String),
    FailGeneration,
    FailTransport,
    Stall(Duration),
}

/// Scripted generation capability that records its prompts.
#[derive(Debug)]
pub struct FakeLlm {
    behavior: Behavior,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::new(Behavior::Answer(text.to_string()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LlmClient for FakeLlm {
    fn provider_name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }

        match &self.behavior {
            Behavior::Answer(text) => Ok(LlmResponse {
                content: text.clone(),
                model: request.model.clone(),
                usage: LlmUsage::new(10, 5),
            }),
            Behavior::FailGeneration => {
                Err(AppError::Generation("API error (500): overloaded".to_string()))
            }
            Behavior::FailTransport => {
                Err(AppError::Transport("connection refused".to_string()))
            }
            Behavior::Stall(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(LlmResponse {
                    content: "too late".to_string(),
                    model: request.model.clone(),
                    usage: LlmUsage::default(),
                })
            }
        }
    }
}
