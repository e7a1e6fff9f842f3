//! # pdfqa-rag
//!
//! Question answering over a collection of PDF documents.
//!
//! ## Overview
//!
//! Two flows share one persisted vector index:
//!
//! - **ingest**: [`TextExtractor`] → [`RecursiveChunker`] → [`IndexBuilder`]
//!   → [`VectorStore::save`]
//! - **ask**: [`Retriever`] → [`AnswerSynthesizer`]
//!
//! [`RagPipeline`] wires them together. The embedding and generative
//! models sit behind the [`Embedder`] and [`Generator`] traits so providers
//! can be swapped without touching the pipeline.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pdfqa_rag::{ProviderConfig, RagConfig, RagPipeline, SourceDocument};
//!
//! let (embedder, generator) = ProviderConfig::from_env()?.build_services()?;
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::from_env()?)
//!     .embedder(embedder)
//!     .generator(generator)
//!     .build()?;
//!
//! pipeline.ingest(vec![SourceDocument::from_path("report.pdf").await?]).await?;
//! let answer = pipeline.ask("What was the revenue in 2023?").await?;
//! ```
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `pdf` | [`PdfTextExtractor`] backed by `pdf-extract` (default) |
//! | `gemini` | Gemini embedding and generation (default) |
//! | `openai` | OpenAI embedding and chat completion (default) |

pub mod chunking;
pub mod config;
mod deadline;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
#[cfg(feature = "gemini")]
pub mod gemini;
pub mod generation;
pub mod index;
pub mod inmemory;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod provider;
pub mod retriever;
pub mod store;
pub mod synthesis;

pub use chunking::{Chunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, SearchResult, SourceDocument};
pub use embedding::Embedder;
pub use error::{ErrorKind, RagError, Result};
#[cfg(feature = "pdf")]
pub use extract::PdfTextExtractor;
pub use extract::{TextExtractor, extract_corpus};
pub use generation::Generator;
pub use index::{INDEX_FORMAT_VERSION, IndexBuilder, IndexEntry, IndexManifest, VectorIndex};
pub use inmemory::InMemoryVectorStore;
pub use pipeline::{IngestReport, PipelineState, RagPipeline, RagPipelineBuilder};
pub use provider::{Provider, ProviderConfig};
pub use retriever::Retriever;
pub use store::{FileVectorStore, VectorStore};
pub use synthesis::{Answer, AnswerSynthesizer, UNAVAILABLE_ANSWER, build_context, render_prompt};
