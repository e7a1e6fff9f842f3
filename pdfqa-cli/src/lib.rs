//! The `pdfqa` command-line front end.
//!
//! ```text
//! pdfqa ingest report.pdf appendix.pdf
//! pdfqa ask "What was the revenue in 2023?" --sources
//! pdfqa status
//! ```
//!
//! Credentials and tuning come from the environment (and a `.env` file);
//! see [`pdfqa_rag::RagConfigBuilder::from_lookup`] and
//! [`pdfqa_rag::ProviderConfig::from_lookup`].

pub mod cli;
pub mod commands;
pub mod report;

use std::io::Write;

use pdfqa_rag::{FileVectorStore, RagConfig, RagPipeline};
use tracing::info;

pub use cli::{Cli, Command};

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Run one parsed command, writing its output to `out`.
pub async fn run(cli: Cli, out: &mut impl Write) -> anyhow::Result<()> {
    let config = cli.rag_config(env)?;

    match &cli.command {
        Command::Status => {
            let store = FileVectorStore::new(config.index_dir.clone());
            commands::status(&store, &config.index_name, out).await
        }
        Command::Ingest { files } => {
            let pipeline = build_pipeline(&cli, config)?;
            commands::ingest(&pipeline, files, out).await
        }
        Command::Ask { question, top_k, sources } => {
            let pipeline = build_pipeline(&cli, config)?;
            commands::ask(&pipeline, question, *top_k, *sources, out).await
        }
    }
}

/// Resolve the provider (failing fast on a missing key) and assemble the pipeline.
fn build_pipeline(cli: &Cli, config: RagConfig) -> anyhow::Result<RagPipeline> {
    let provider = cli.provider_config(env)?;
    let (embedder, generator) = provider.build_services()?;
    info!(
        provider = %provider.provider,
        embedder = embedder.model_id(),
        generator = generator.model_id(),
        "using provider"
    );

    let pipeline =
        RagPipeline::builder().config(config).embedder(embedder).generator(generator).build()?;
    Ok(pipeline)
}
