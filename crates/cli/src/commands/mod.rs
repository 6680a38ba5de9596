//! Command handlers for the MedIntel CLI.

pub mod ask;
pub mod ingest;
pub mod stats;

pub use ask::AskCommand;
pub use ingest::IngestCommand;
pub use stats::StatsCommand;

use medintel_core::AppConfig;
use medintel_knowledge::IndexConfig;

/// Index parameters implied by the embedding and chunking settings.
pub(crate) fn index_config(config: &AppConfig) -> IndexConfig {
    IndexConfig {
        dimension: config.embedding.dimensions,
        chunk_size: config.index.chunk_size,
        chunk_overlap: config.index.chunk_overlap,
    }
}
