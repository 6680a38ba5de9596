//! Error types for MedIntel.
//!
//! This module defines a unified error enum covering configuration, index
//! integrity, capability (embedding/generation) and ambient I/O failures.

use thiserror::Error;

/// Unified error type for MedIntel.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// We never panic: errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid construction parameters (fatal at construction time)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Vector dimension disagrees with the index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Persisted index is missing, corrupt or of an unsupported schema
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Embedding capability failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Generation capability failed after the request reached the provider
    #[error("Generation error: {0}")]
    Generation(String),

    /// Network-level failure before any response content existed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Index and ingestion errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the failure happened before any content was produced and the
    /// call may be attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Transport(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_is_transient() {
        assert!(AppError::Transport("connection refused".into()).is_transient());
        assert!(!AppError::Generation("HTTP 500".into()).is_transient());
        assert!(!AppError::Embedding("bad model".into()).is_transient());
        assert!(!AppError::Config("bad".into()).is_transient());
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = AppError::DimensionMismatch {
            expected: 384,
            actual: 768,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 384, got 768");
    }
}
