//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] sequences the two user-facing flows:
//!
//! - **ingest**: extract → chunk → embed → publish the index
//! - **ask**: retrieve → synthesize
//!
//! Progress is published as a [`PipelineState`] on a `tokio::sync::watch`
//! channel so a front end can follow along.
//!
//! # Example
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
//! pipeline.ingest(vec![SourceDocument::from_path("manual.pdf").await?]).await?;
//! let answer = pipeline.ask("How do I reset the device?").await?;
//! println!("Reply: {}", answer.text);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::SourceDocument;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::extract::{TextExtractor, extract_corpus};
use crate::generation::Generator;
use crate::index::{IndexBuilder, IndexManifest};
use crate::retriever::Retriever;
use crate::store::{FileVectorStore, VectorStore};
use crate::synthesis::{Answer, AnswerSynthesizer};

/// Where the pipeline is in its ingest/query lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    /// No index has been built by this pipeline.
    Idle,
    /// Documents are being extracted, chunked and embedded.
    Ingesting,
    /// An index is published and ready for questions.
    Indexed,
    /// A question is being answered.
    Querying,
    /// The last question was answered.
    Answered,
    /// The last question failed.
    Failed,
}

/// Summary of a successful ingest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Number of documents processed.
    pub documents: usize,
    /// Characters in the extracted corpus.
    pub characters: usize,
    /// Number of chunks embedded.
    pub chunks: usize,
    /// Embedding dimensionality.
    pub dimensions: usize,
    /// Where the index was published.
    pub location: String,
}

/// The RAG pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`]. The index on storage is the
/// source of truth: whether a question can be answered is decided by
/// checking the store, not by this value's in-memory state.
pub struct RagPipeline {
    config: RagConfig,
    extractor: Arc<dyn TextExtractor>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    store: Arc<dyn VectorStore>,
    state: watch::Sender<PipelineState>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// The current state.
    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Where the index is stored.
    pub fn index_location(&self) -> String {
        self.store.location(&self.config.index_name)
    }

    /// Whether an index has been published at the configured location.
    pub async fn index_exists(&self) -> Result<bool> {
        self.store.exists(&self.config.index_name).await
    }

    /// Load the manifest of the published index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexNotFound`] or [`RagError::IndexLoad`] as
    /// [`VectorStore::load`] does.
    pub async fn describe_index(&self) -> Result<IndexManifest> {
        let index = self.store.load(&self.config.index_name).await?;
        Ok(index.manifest().clone())
    }

    /// Build and publish an index from `documents`, replacing any previous one.
    ///
    /// On failure nothing is published and the previous index, if any,
    /// stays in place.
    ///
    /// # Errors
    ///
    /// - [`RagError::NoDocuments`] if `documents` is empty
    /// - [`RagError::Extraction`] if a document cannot be parsed
    /// - [`RagError::EmptyCorpus`] if no text could be extracted
    /// - [`RagError::EmbeddingService`] if embedding fails or times out
    /// - [`RagError::Persistence`] if the index cannot be written
    pub async fn ingest(&self, documents: Vec<SourceDocument>) -> Result<IngestReport> {
        if documents.is_empty() {
            return Err(RagError::NoDocuments);
        }

        self.state.send_replace(PipelineState::Ingesting);
        match self.run_ingest(documents).await {
            Ok(report) => {
                self.state.send_replace(PipelineState::Indexed);
                info!(
                    documents = report.documents,
                    chunk_count = report.chunks,
                    location = %report.location,
                    "index published"
                );
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "ingest failed");
                let resting = match self.index_exists().await {
                    Ok(true) => PipelineState::Indexed,
                    _ => PipelineState::Idle,
                };
                self.state.send_replace(resting);
                Err(e)
            }
        }
    }

    async fn run_ingest(&self, documents: Vec<SourceDocument>) -> Result<IngestReport> {
        let document_count = documents.len();
        let extractor = Arc::clone(&self.extractor);
        let corpus =
            tokio::task::spawn_blocking(move || extract_corpus(extractor.as_ref(), &documents))
                .await
                .map_err(|e| RagError::Extraction {
                    document: format!("{document_count} document(s)"),
                    message: format!("text extraction aborted: {e}"),
                })??;

        if corpus.trim().is_empty() {
            return Err(RagError::EmptyCorpus { documents: document_count });
        }
        let characters = corpus.chars().count();

        let chunks = self.chunker.chunk(&corpus);
        if chunks.is_empty() {
            return Err(RagError::EmptyCorpus { documents: document_count });
        }
        info!(documents = document_count, characters, chunk_count = chunks.len(), "chunked corpus");

        let index = IndexBuilder::new(Arc::clone(&self.embedder))
            .batch_size(self.config.embed_batch_size)
            .concurrency(self.config.embed_concurrency)
            .timeout(self.config.service_timeout)
            .build(chunks)
            .await?;

        self.store.save(&self.config.index_name, &index).await?;

        Ok(IngestReport {
            documents: document_count,
            characters,
            chunks: index.len(),
            dimensions: index.manifest().dimensions,
            location: self.index_location(),
        })
    }

    /// Answer `question` from the published index using the configured `top_k`.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyQuestion`] if `question` is blank
    /// - [`RagError::IndexNotFound`] if nothing has been ingested yet; no
    ///   service is called in that case
    /// - [`RagError::IndexLoad`] if the index is corrupt or incompatible
    /// - [`RagError::EmbeddingService`] / [`RagError::GenerationService`]
    ///   if a service call fails or times out
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        self.ask_with_top_k(question, self.config.top_k).await
    }

    /// Like [`ask`](Self::ask), retrieving `top_k` chunks instead of the
    /// configured number.
    pub async fn ask_with_top_k(&self, question: &str, top_k: usize) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::EmptyQuestion);
        }

        self.state.send_replace(PipelineState::Querying);
        match self.run_query(question, top_k).await {
            Ok(answer) => {
                self.state.send_replace(PipelineState::Answered);
                Ok(answer)
            }
            Err(e) => {
                error!(error = %e, "query failed");
                self.state.send_replace(PipelineState::Failed);
                Err(e)
            }
        }
    }

    async fn run_query(&self, question: &str, top_k: usize) -> Result<Answer> {
        let timeout = self.config.service_timeout;

        let results = Retriever::new(
            Arc::clone(&self.store),
            Arc::clone(&self.embedder),
            self.config.index_name.as_str(),
        )
        .top_k(top_k)
        .timeout(timeout)
        .retrieve(question)
        .await?;

        AnswerSynthesizer::new(Arc::clone(&self.generator))
            .temperature(self.config.temperature)
            .timeout(timeout)
            .synthesize(question, results)
            .await
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedder` and `generator` are required. The extractor defaults
/// to [`PdfTextExtractor`](crate::PdfTextExtractor) when the `pdf` feature is
/// enabled, the chunker to a [`RecursiveChunker`] sized from the config, and
/// the store to a [`FileVectorStore`] in `config.index_dir`.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedder(Arc::new(embedder))
///     .generator(Arc::new(generator))
///     .vector_store(Arc::new(InMemoryVectorStore::new()))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    extractor: Option<Arc<dyn TextExtractor>>,
    chunker: Option<Arc<dyn Chunker>>,
    embedder: Option<Arc<dyn Embedder>>,
    generator: Option<Arc<dyn Generator>>,
    vector_store: Option<Arc<dyn VectorStore>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the text extractor.
    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Replace the chunker derived from the config.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding service.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the generative service.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Build the [`RagPipeline`], validating the config and that all
    /// required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the config is invalid or a required
    /// field is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.ok_or_else(|| RagError::Config("config is required".to_string()))?;
        config.validate()?;

        let embedder =
            self.embedder.ok_or_else(|| RagError::Config("embedder is required".to_string()))?;
        let generator =
            self.generator.ok_or_else(|| RagError::Config("generator is required".to_string()))?;
        let extractor = match self.extractor {
            Some(extractor) => extractor,
            None => default_extractor()?,
        };
        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap)?),
        };
        let store: Arc<dyn VectorStore> = match self.vector_store {
            Some(store) => store,
            None => Arc::new(FileVectorStore::new(config.index_dir.clone())),
        };

        let (state, _) = watch::channel(PipelineState::Idle);
        Ok(RagPipeline { config, extractor, chunker, embedder, generator, store, state })
    }
}

#[cfg(feature = "pdf")]
fn default_extractor() -> Result<Arc<dyn TextExtractor>> {
    Ok(Arc::new(crate::extract::PdfTextExtractor))
}

#[cfg(not(feature = "pdf"))]
fn default_extractor() -> Result<Arc<dyn TextExtractor>> {
    Err(RagError::Config("extractor is required when the `pdf` feature is disabled".to_string()))
}
