//! Command-line arguments.

use std::path::PathBuf;

use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};
use pdfqa_rag::{ProviderConfig, RagConfig, RagConfigBuilder};

#[derive(Debug, Parser)]
#[command(name = "pdfqa", about = "Ask questions about your PDF files", version)]
pub struct Cli {
    /// Directory holding the index
    #[arg(long, global = true, env = "PDFQA_INDEX_DIR")]
    pub index_dir: Option<PathBuf>,

    /// Name of the index inside the index directory
    #[arg(long, global = true, env = "PDFQA_INDEX_NAME")]
    pub index_name: Option<String>,

    /// Model provider: gemini or openai
    #[arg(long, global = true, env = "PDFQA_PROVIDER")]
    pub provider: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract, chunk and embed PDF files, replacing the current index
    Ingest {
        /// PDF files to process, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Answer a question from the indexed PDF files
    Ask {
        /// The question
        question: String,
        /// Number of chunks to retrieve (at least 1)
        #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
        top_k: Option<usize>,
        /// Also print the retrieved chunks
        #[arg(long)]
        sources: bool,
    },

    /// Show whether an index exists and what it contains
    Status,
}

impl Cli {
    /// Pipeline settings from `lookup`, with the global flags taking precedence.
    pub fn rag_config(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> pdfqa_rag::Result<RagConfig> {
        let mut builder = RagConfigBuilder::from_lookup(lookup)?;
        if let Some(dir) = &self.index_dir {
            builder = builder.index_dir(dir);
        }
        if let Some(name) = &self.index_name {
            builder = builder.index_name(name);
        }
        builder.build()
    }

    /// Provider settings from `lookup`, with `--provider` taking precedence.
    pub fn provider_config(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> pdfqa_rag::Result<ProviderConfig> {
        ProviderConfig::from_lookup(|key| match (key, &self.provider) {
            ("PDFQA_PROVIDER", Some(provider)) => Some(provider.clone()),
            _ => lookup(key),
        })
    }
}
