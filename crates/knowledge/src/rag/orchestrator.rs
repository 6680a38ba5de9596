//! Query lifecycle: retrieve, gate on evidence, generate, score, assemble.

use crate::embeddings::create_provider;
use crate::rag::scoring::ConfidenceScorer;
use crate::rag::synthesis::AnswerSynthesizer;
use crate::rag::types::{
    QueryState, Response, Source, ANSWER_WARNING, GENERATION_FAILURE_WARNING,
};
use crate::retrieval::RetrievalEngine;
use crate::types::RetrievalResult;
use crate::vector_index::SharedIndex;
use medintel_core::config::RetrievalSettings;
use medintel_core::{AppConfig, AppResult};
use medintel_llm::{create_client_from_config, CallPolicy};
use medintel_prompt::{ContextEntry, DISCLAIMER, DISCLAIMER_MARKER};
use std::time::{Duration, Instant};
use unicode_segmentation::UnicodeSegmentation;

const EXCERPT_MARKER: &str = "...";

/// Answers questions over a shared index.
///
/// Holds no per-query state; `query` may run concurrently from many tasks.
pub struct Orchestrator {
    retrieval: RetrievalEngine,
    synthesizer: AnswerSynthesizer,
    scorer: ConfidenceScorer,
    settings: RetrievalSettings,
}

impl Orchestrator {
    pub fn new(
        retrieval: RetrievalEngine,
        synthesizer: AnswerSynthesizer,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            retrieval,
            synthesizer,
            scorer: ConfidenceScorer::new(),
            settings,
        }
    }

    /// Wire the configured embedding and generation providers to `index`.
    pub fn from_config(config: &AppConfig, index: SharedIndex) -> AppResult<Self> {
        let policy = CallPolicy::from_settings(&config.runtime);
        let embedder = create_provider(&config.embedding)?;
        let client = create_client_from_config(config)?;

        tracing::info!(
            llm = %client.provider_name(),
            embedding = %embedder.provider_name(),
            "Orchestrator ready"
        );

        let retrieval = RetrievalEngine::new(embedder, index, policy);
        let synthesizer = AnswerSynthesizer::new(client, &config.llm, policy)?;
        Ok(Self::new(retrieval, synthesizer, config.retrieval.clone()))
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Answer with the configured `top_k`, using the confidence threshold as
    /// the retrieval score threshold.
    pub async fn ask(&self, question: &str) -> AppResult<Response> {
        self.query(
            question,
            self.settings.top_k,
            self.settings.confidence_threshold,
        )
        .await
    }

    /// Run one question through the lifecycle.
    ///
    /// # Errors
    /// Retrieval failures (empty question, embedding, index) are returned.
    /// Generation failures are not: they produce a degraded response.
    #[tracing::instrument(skip(self, question))]
    pub async fn query(
        &self,
        question: &str,
        top_k: usize,
        score_threshold: f32,
    ) -> AppResult<Response> {
        let mut state = QueryState::Received;
        tracing::info!("Processing query: {}", question);

        advance(&mut state, QueryState::Retrieving);
        let retrieval = self
            .retrieval
            .retrieve(question, top_k, score_threshold)
            .await?;
        let retrieval_ms = millis(retrieval.elapsed);
        let results = retrieval.results;

        let threshold = self.settings.confidence_threshold;
        if results.is_empty() || results.iter().all(|r| r.score < threshold) {
            advance(&mut state, QueryState::Insufficient);
            advance(&mut state, QueryState::Refused);
            tracing::info!(
                retrieved = results.len(),
                threshold,
                "Insufficient evidence, refusing"
            );
            return Ok(Response::refusal(question, retrieval_ms));
        }

        advance(&mut state, QueryState::Sufficient);
        advance(&mut state, QueryState::Generating);
        let generation_start = Instant::now();
        let outcome = self.synthesizer.synthesize(question, &results).await;

        let (answer, confidence, generation_ms, warning) = match outcome {
            Ok(synthesis) => {
                advance(&mut state, QueryState::Scoring);
                let confidence = self.scorer.score(&results, &synthesis.text, threshold);
                (
                    synthesis.text,
                    confidence,
                    millis(synthesis.elapsed),
                    ANSWER_WARNING,
                )
            }
            Err(e) => {
                tracing::warn!(error = %e, "Generation failed, returning degraded response");
                (
                    format!("Error generating response: {}", e),
                    0.0,
                    millis(generation_start.elapsed()),
                    GENERATION_FAILURE_WARNING,
                )
            }
        };

        let answer = with_disclaimer(answer);
        let sources = self.sources(&results);
        let contexts = results.iter().map(|r| r.fragment.text.clone()).collect();

        advance(&mut state, QueryState::Complete);
        tracing::info!(
            sources = results.len(),
            confidence,
            "Query complete"
        );

        Ok(Response {
            question: question.to_string(),
            answer,
            sources,
            contexts,
            confidence,
            retrieval_time_ms: retrieval_ms,
            generation_time_ms: generation_ms,
            total_time_ms: retrieval_ms + generation_ms,
            warning: Some(warning.to_string()),
            state,
        })
    }

    fn sources(&self, results: &[RetrievalResult]) -> Vec<Source> {
        results
            .iter()
            .enumerate()
            .map(|(i, result)| Source {
                ref_label: ContextEntry::label_for(i + 1),
                title: result.fragment.metadata.title.clone(),
                year: result.fragment.metadata.year,
                url: result.fragment.metadata.url.clone(),
                score: result.score,
                excerpt: excerpt(&result.fragment.text, self.settings.excerpt_chars),
            })
            .collect()
    }
}

fn advance(state: &mut QueryState, next: QueryState) {
    tracing::debug!(from = %state, to = %next, "Query state transition");
    *state = next;
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Append the canonical disclaimer unless the answer already carries one.
pub fn with_disclaimer(answer: String) -> String {
    if answer.to_lowercase().contains(DISCLAIMER_MARKER) {
        answer
    } else {
        format!("{}\n\n{}", answer, DISCLAIMER)
    }
}

/// First `max_chars` grapheme clusters of `text`, marked when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut graphemes = text.grapheme_indices(true);
    match graphemes.nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], EXCERPT_MARKER),
        None => text.to_string(),
    }
}
