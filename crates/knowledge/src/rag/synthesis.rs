//! Grounded answer generation.

use crate::types::RetrievalResult;
use medintel_core::config::LlmSettings;
use medintel_core::AppResult;
use medintel_llm::{CallPolicy, LlmClient, LlmRequest};
use medintel_prompt::{ContextEntry, PromptBuilder};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Generated answer text and generation latency.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub text: String,
    pub elapsed: Duration,
}

/// Builds the grounding prompt and calls the generation capability.
pub struct AnswerSynthesizer {
    client: Arc<dyn LlmClient>,
    prompts: PromptBuilder,
    model: String,
    temperature: f32,
    max_tokens: u32,
    policy: CallPolicy,
}

impl AnswerSynthesizer {
    pub fn new(
        client: Arc<dyn LlmClient>,
        settings: &LlmSettings,
        policy: CallPolicy,
    ) -> AppResult<Self> {
        Ok(Self {
            client,
            prompts: PromptBuilder::new()?,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            policy,
        })
    }

    pub fn provider_name(&self) -> &str {
        self.client.provider_name()
    }

    /// Generate an answer to `question` from `results`, which must already be
    /// in descending score order.
    #[tracing::instrument(skip(self, question, results), fields(provider = %self.client.provider_name(), model = %self.model))]
    pub async fn synthesize(
        &self,
        question: &str,
        results: &[RetrievalResult],
    ) -> AppResult<Synthesis> {
        let entries = context_entries(results);
        let prompt = self.prompts.build_grounding_prompt(question, &entries)?;

        let mut request = LlmRequest::new(prompt.user, self.model.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        if let Some(system) = prompt.system {
            request = request.with_system(system);
        }

        let start = Instant::now();
        let client = &self.client;
        let response = self
            .policy
            .run("generation", || client.complete(&request))
            .await?;
        let elapsed = start.elapsed();

        tracing::debug!(
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Answer generated"
        );

        Ok(Synthesis {
            text: response.content,
            elapsed,
        })
    }
}

/// Number the results `REF_1..REF_n` in the order given.
pub fn context_entries(results: &[RetrievalResult]) -> Vec<ContextEntry> {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| ContextEntry {
            label: ContextEntry::label_for(i + 1),
            title: result.fragment.metadata.title.clone(),
            source: result.fragment.metadata.source.clone(),
            year: result.fragment.metadata.year,
            text: result.fragment.text.clone(),
            score: result.score,
        })
        .collect()
}
