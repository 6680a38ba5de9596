//! Retrieval-and-grounding engine for MedIntel.
//!
//! Documents are split by the [`Chunker`], embedded, and stored in an
//! [`EmbeddingIndex`] persisted as a SQLite snapshot. Questions go through the
//! [`Orchestrator`], which retrieves fragments, refuses when the evidence is
//! too weak, and otherwise asks the generation capability for a cited answer.

pub mod chunker;
pub mod embeddings;
pub mod index;
pub mod ingest;
pub mod loader;
pub mod rag;
pub mod retrieval;
pub mod snapshot;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunker::Chunker;
pub use embeddings::{create_provider, EmbeddingProvider};
pub use index::{EmbeddingIndex, IndexConfig};
pub use ingest::Ingestor;
pub use loader::{DirectorySource, DocumentSource};
pub use rag::{ConfidenceScorer, Orchestrator, QueryState, Response, Source};
pub use retrieval::{Retrieval, RetrievalEngine};
pub use types::{Document, Fragment, FragmentMetadata, IndexStats, IngestStats, RetrievalResult};
pub use vector_index::{read_index, share, write_index, SharedIndex, VectorIndex};
