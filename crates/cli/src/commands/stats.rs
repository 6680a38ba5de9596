//! Stats command handler.

use clap::Args;
use medintel_core::{config::AppConfig, AppResult};
use medintel_knowledge::{snapshot, VectorIndex};

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let index = snapshot::load(&config.index.path)?;
        let stats = index.stats();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("Index: {}", config.index.path.display());
        println!("Fragments: {}", stats.fragment_count);
        println!("Documents: {}", stats.unique_document_count);
        println!("Dimension: {}", stats.dimension);
        println!(
            "Chunking: {} chars, {} overlap",
            stats.chunk_size, stats.chunk_overlap
        );
        if let Some(built_at) = stats.built_at {
            println!("Built at: {}", built_at.to_rfc3339());
        }

        Ok(())
    }
}
