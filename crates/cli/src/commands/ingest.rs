//! Ingest command handler.

use super::index_config;
use clap::Args;
use medintel_core::{config::AppConfig, AppResult};
use medintel_knowledge::{
    read_index, share, snapshot, DirectorySource, DocumentSource, EmbeddingIndex, Ingestor,
    VectorIndex,
};
use std::path::PathBuf;

/// Load documents and add them to the index
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest (.txt, .md, .json)
    #[arg(long, required = true)]
    pub path: Vec<PathBuf>,

    /// Start from an empty index instead of appending
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");
        tracing::debug!("Ingest options: {:?}", self);

        let index_path = &config.index.path;
        let index = if self.reset {
            tracing::info!("Resetting index at {:?}", index_path);
            EmbeddingIndex::new(index_config(config))?
        } else {
            snapshot::open_or_create(index_path, index_config(config))?
        };

        let documents = DirectorySource::new(self.path.clone()).load()?;
        let ingestor = Ingestor::from_config(config)?;

        let index = share(index);
        let stats = ingestor.ingest(&index, documents).await?;
        let index = read_index(&index)?;
        index.save(index_path)?;
        let index_stats = index.stats();

        if self.json {
            let output = serde_json::json!({
                "documents": stats.documents,
                "fragments": stats.fragments,
                "bytes": stats.bytes,
                "durationSecs": stats.duration_secs,
                "index": index_path.display().to_string(),
                "totalFragments": index_stats.fragment_count,
                "totalDocuments": index_stats.unique_document_count,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Ingested {} documents ({} fragments, {} bytes) in {:.2}s",
                stats.documents, stats.fragments, stats.bytes, stats.duration_secs
            );
            println!(
                "Index {} now holds {} fragments from {} documents",
                index_path.display(),
                index_stats.fragment_count,
                index_stats.unique_document_count
            );
        }

        Ok(())
    }
}
