//! Generation capability for MedIntel.
//!
//! This crate provides a provider-agnostic abstraction for calling Large
//! Language Models, plus the timeout/retry policy shared by every capability
//! call in the workspace.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI**: Chat completions API
//! - **Gemini**: Google `generateContent` API
//!
//! # Example
//! ```no_run
//! use medintel_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("What is hypertension?", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod resilience;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{create_client, create_client_from_config};
pub use providers::{GeminiClient, OllamaClient, OpenAiClient};
pub use resilience::CallPolicy;
pub use types::ProviderType;
