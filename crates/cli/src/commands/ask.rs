//! Ask command handler.

use clap::Args;
use medintel_core::{config::AppConfig, AppResult};
use medintel_knowledge::{share, snapshot, Orchestrator};

/// Ask a question against the index
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to answer
    pub question: String,

    /// Number of fragments to retrieve (default: retrieval.topK)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Minimum similarity for retrieved fragments (default: retrieval.confidenceThreshold)
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask options: {:?}", self);

        let index = snapshot::load(&config.index.path)?;
        let orchestrator = Orchestrator::from_config(config, share(index))?;

        let top_k = self.top_k.unwrap_or(config.retrieval.top_k);
        let threshold = self
            .threshold
            .unwrap_or(config.retrieval.confidence_threshold);

        let response = orchestrator.query(&self.question, top_k, threshold).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&response)?);
            return Ok(());
        }

        println!("Answer:");
        println!("{}", response.answer);
        println!();

        if response.sources.is_empty() {
            println!("Sources: (no sources available)");
        } else {
            println!("Sources:");
            for source in &response.sources {
                let year = source
                    .year
                    .map(|y| y.to_string())
                    .unwrap_or_else(|| "N/A".to_string());
                println!(
                    "- [{}] {} ({}) score {:.3}",
                    source.ref_label, source.title, year, source.score
                );
                if let Some(url) = &source.url {
                    println!("  {}", url);
                }
            }
        }

        println!();
        println!(
            "Confidence: {:.2} | retrieval {:.0} ms, generation {:.0} ms, total {:.0} ms",
            response.confidence,
            response.retrieval_time_ms,
            response.generation_time_ms,
            response.total_time_ms
        );
        if let Some(warning) = &response.warning {
            println!("{}", warning);
        }

        Ok(())
    }
}
