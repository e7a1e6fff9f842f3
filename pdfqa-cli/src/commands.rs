//! Subcommand implementations.
//!
//! Each command writes its results to `out`; diagnostics go through
//! `tracing` to stderr.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use pdfqa_rag::{RagPipeline, SourceDocument, VectorStore};

const PREVIEW_CHARS: usize = 160;

/// Read `files` in order and rebuild the index from them.
pub async fn ingest(pipeline: &RagPipeline, files: &[PathBuf], out: &mut impl Write) -> Result<()> {
    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        documents.push(SourceDocument::from_path(file).await?);
    }

    let report = pipeline.ingest(documents).await?;
    writeln!(
        out,
        "Indexed {} chunk(s) from {} document(s) ({} characters) into {}",
        report.chunks, report.documents, report.characters, report.location
    )?;
    Ok(())
}

/// Answer `question` and print the reply, optionally with its sources.
pub async fn ask(
    pipeline: &RagPipeline,
    question: &str,
    top_k: Option<usize>,
    show_sources: bool,
    out: &mut impl Write,
) -> Result<()> {
    let answer = match top_k {
        Some(k) => pipeline.ask_with_top_k(question, k).await?,
        None => pipeline.ask(question).await?,
    };

    writeln!(out, "Reply: {}", answer.text.trim())?;
    if show_sources {
        writeln!(out)?;
        for (rank, result) in answer.sources.iter().enumerate() {
            writeln!(
                out,
                "[{}] chunk {} (score {:.3}): {}",
                rank + 1,
                result.chunk.index,
                result.score,
                preview(&result.chunk.text)
            )?;
        }
    }
    Ok(())
}

/// Describe the index called `name` in `store`.
///
/// Needs no credentials: only the store is consulted.
pub async fn status(store: &dyn VectorStore, name: &str, out: &mut impl Write) -> Result<()> {
    let location = store.location(name);
    if !store.exists(name).await? {
        writeln!(out, "No index at {location}. Run `pdfqa ingest <FILE>...` to build one.")?;
        return Ok(());
    }

    let index = store.load(name).await?;
    let manifest = index.manifest();
    writeln!(out, "Index:      {location}")?;
    writeln!(out, "Embedder:   {}", manifest.embedder)?;
    writeln!(out, "Chunks:     {}", manifest.chunk_count)?;
    writeln!(out, "Dimensions: {}", manifest.dimensions)?;
    writeln!(out, "Built:      {}", manifest.created_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    Ok(())
}

/// `text` on a single line, shortened to a readable length.
fn preview(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}…")
}
