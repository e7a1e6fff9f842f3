//! Document-to-text extraction.
//!
//! A [`TextExtractor`] turns one [`SourceDocument`] into its page texts;
//! [`extract_corpus`] concatenates the pages of every document, in upload
//! order, into the single corpus string the chunker consumes.

use tracing::{debug, warn};

use crate::document::SourceDocument;
use crate::error::Result;

/// A service that converts a binary document into an ordered list of page texts.
///
/// Extraction is CPU-bound and synchronous; the pipeline runs it on a
/// blocking thread.
pub trait TextExtractor: Send + Sync {
    /// Extract the text of every page, in page order.
    ///
    /// Pages without text are returned as empty strings.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Extraction`](crate::RagError::Extraction) if the
    /// bytes cannot be parsed in the expected format.
    fn extract_pages(&self, document: &SourceDocument) -> Result<Vec<String>>;
}

/// Concatenate the page texts of all documents into one corpus string.
///
/// Documents and pages that yield no text contribute nothing. The caller is
/// responsible for rejecting a corpus that is empty or whitespace-only.
///
/// # Errors
///
/// Propagates the first extraction failure; no partial corpus is returned.
pub fn extract_corpus(
    extractor: &dyn TextExtractor,
    documents: &[SourceDocument],
) -> Result<String> {
    let mut corpus = String::new();

    for document in documents {
        let pages = extractor.extract_pages(document)?;
        let page_count = pages.len();
        let before = corpus.len();

        for page in pages {
            corpus.push_str(&page);
        }

        let extracted = corpus.len() - before;
        if extracted == 0 {
            warn!(document = %document.name, page_count, "document yielded no text");
        } else {
            debug!(document = %document.name, page_count, bytes = extracted, "extracted document");
        }
    }

    Ok(corpus)
}

/// A [`TextExtractor`] for PDF files backed by the `pdf-extract` crate.
///
/// This type is only available when the `pdf` feature is enabled.
#[cfg(feature = "pdf")]
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

#[cfg(feature = "pdf")]
impl TextExtractor for PdfTextExtractor {
    fn extract_pages(&self, document: &SourceDocument) -> Result<Vec<String>> {
        pdf_extract::extract_text_from_mem_by_pages(&document.bytes).map_err(|e| {
            crate::error::RagError::Extraction {
                document: document.name.clone(),
                message: format!("not a readable PDF: {e}"),
            }
        })
    }
}
