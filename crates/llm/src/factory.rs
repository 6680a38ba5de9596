//! LLM provider factory.
//!
//! This module creates generation clients from application configuration.
//! It handles provider resolution and secret injection; everything after
//! construction works against `Arc<dyn LlmClient>`.

use crate::client::LlmClient;
use crate::providers::{GeminiClient, OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use medintel_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client for the given provider.
///
/// # Arguments
/// * `provider` - Resolved provider type
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key (required by hosted providers)
///
/// # Errors
/// Returns `AppError::Config` if a hosted provider has no API key.
pub fn create_client(
    provider: ProviderType,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let base_url = endpoint.unwrap_or(provider.default_endpoint());

    let api_key = match api_key {
        Some(key) if !key.trim().is_empty() => Some(key.trim().to_string()),
        _ if provider.requires_api_key() => {
            return Err(AppError::Config(format!(
                "{} provider requires API key",
                provider
            )));
        }
        _ => None,
    };

    tracing::debug!(provider = %provider, endpoint = base_url, "Creating LLM client");

    match (provider, api_key) {
        (ProviderType::Ollama, _) => Ok(Arc::new(OllamaClient::with_base_url(base_url))),
        (ProviderType::OpenAi, Some(key)) => Ok(Arc::new(OpenAiClient::new(base_url, key))),
        (ProviderType::Gemini, Some(key)) => Ok(Arc::new(GeminiClient::new(base_url, key))),
        (other, None) => Err(AppError::Config(format!(
            "{} provider requires API key",
            other
        ))),
    }
}

/// Create the configured LLM client, resolving the API key from the environment.
pub fn create_client_from_config(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let provider = ProviderType::parse(&config.llm.provider).ok_or_else(|| {
        AppError::Config(format!("Unknown provider: {}", config.llm.provider))
    })?;

    let api_key = config.resolve_api_key();
    create_client(provider, config.llm.endpoint.as_deref(), api_key.as_deref())
}
