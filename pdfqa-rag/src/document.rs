//! Data types for source documents, chunks, and search results.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// An uploaded document: raw bytes plus a display name used in error messages.
///
/// The bytes are opaque until a [`TextExtractor`](crate::TextExtractor)
/// turns them into page texts.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Display name, usually the file name.
    pub name: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    /// Create a document from in-memory bytes.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), bytes: bytes.into() }
    }

    /// Read a document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Extraction`] if the file cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = tokio::fs::read(path).await.map_err(|e| RagError::Extraction {
            document: name.clone(),
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Ok(Self { name, bytes })
    }
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// A bounded-size segment of the corpus text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk in the chunker's output.
    pub index: usize,
    /// The text content of the chunk.
    pub text: String,
}

/// A retrieved [`Chunk`] paired with its similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity with the query (higher is more relevant).
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn from_path_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();

        let doc = SourceDocument::from_path(&file).await.unwrap();
        assert_eq!(doc.name, "report.pdf");
        assert_eq!(doc.bytes, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn missing_file_is_extraction_error() {
        let err = SourceDocument::from_path("/nonexistent/missing.pdf").await.unwrap_err();
        assert!(matches!(err, RagError::Extraction { document, .. } if document == "missing.pdf"));
    }

    #[test]
    fn debug_hides_bytes() {
        let doc = SourceDocument::new("a.pdf", vec![0u8; 4096]);
        assert_eq!(format!("{doc:?}"), "SourceDocument { name: \"a.pdf\", bytes: 4096 }");
    }
}
