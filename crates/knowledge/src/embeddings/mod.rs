//! Embedding capability: text to fixed-dimension vectors.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
