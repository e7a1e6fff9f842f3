//! Error types for the `pdfqa-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting documents or answering questions.
#[derive(Debug, Error)]
pub enum RagError {
    /// A document could not be read or parsed as a PDF.
    #[error("Extraction error ({document}): {message}")]
    Extraction {
        /// Display name of the offending document.
        document: String,
        /// A description of the failure.
        message: String,
    },

    /// Every document was parsed but none of them yielded any text.
    #[error("No text could be extracted from {documents} document(s)")]
    EmptyCorpus {
        /// Number of documents that were processed.
        documents: usize,
    },

    /// Ingest was invoked without any documents.
    #[error("No documents were supplied for ingestion")]
    NoDocuments,

    /// The question was empty or whitespace-only.
    #[error("Question must not be empty")]
    EmptyQuestion,

    /// Invalid configuration or a missing credential.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The embedding service failed, timed out, or returned malformed output.
    #[error("Embedding service error ({provider}): {message}")]
    EmbeddingService {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generative service failed, timed out, or returned no content.
    #[error("Generation service error ({provider}): {message}")]
    GenerationService {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The index could not be written.
    #[error("Persistence error ({path}): {message}")]
    Persistence {
        /// Storage location that was being written.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// The index exists but is unreadable, corrupt, or incompatible.
    #[error("Index load error ({path}): {message}")]
    IndexLoad {
        /// Storage location that was being read.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// No index has been built at the expected location yet.
    #[error("Index '{name}' not found at {path}")]
    IndexNotFound {
        /// Index name.
        name: String,
        /// Storage location that was checked.
        path: String,
    },
}

/// Coarse classification of a [`RagError`].
///
/// Front ends pick their messaging from the kind; "no index yet", "service
/// failure" and "bad input" never collapse into one generic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller supplied nothing usable (no documents, blank question).
    InvalidInput,
    /// Document content could not be turned into text.
    Extraction,
    /// Invalid parameters or a missing credential.
    Configuration,
    /// Embedding service failure.
    EmbeddingService,
    /// Generative service failure.
    GenerationService,
    /// Index could not be written.
    Persistence,
    /// Index exists but cannot be used.
    IndexLoad,
    /// No index has been built yet.
    IndexNotFound,
}

impl RagError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::NoDocuments | RagError::EmptyQuestion => ErrorKind::InvalidInput,
            RagError::Extraction { .. } | RagError::EmptyCorpus { .. } => ErrorKind::Extraction,
            RagError::Config(_) => ErrorKind::Configuration,
            RagError::EmbeddingService { .. } => ErrorKind::EmbeddingService,
            RagError::GenerationService { .. } => ErrorKind::GenerationService,
            RagError::Persistence { .. } => ErrorKind::Persistence,
            RagError::IndexLoad { .. } => ErrorKind::IndexLoad,
            RagError::IndexNotFound { .. } => ErrorKind::IndexNotFound,
        }
    }

    pub(crate) fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::EmbeddingService { provider: provider.into(), message: message.into() }
    }

    pub(crate) fn generation(provider: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::GenerationService { provider: provider.into(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
