//! User-facing failure messages and exit codes.

use pdfqa_rag::{ErrorKind, RagError};

/// Exit code for a failure of the given kind.
pub fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::InvalidInput => 2,
        ErrorKind::Configuration => 3,
        ErrorKind::Extraction => 4,
        ErrorKind::IndexNotFound => 5,
        ErrorKind::IndexLoad => 6,
        ErrorKind::Persistence => 7,
        ErrorKind::EmbeddingService => 8,
        ErrorKind::GenerationService => 9,
    }
}

/// A message telling the user what went wrong and what to do next.
pub fn describe(err: &RagError) -> String {
    match err {
        RagError::NoDocuments => "Please supply at least one PDF file.".to_string(),
        RagError::EmptyQuestion => "Please enter a question.".to_string(),
        RagError::EmptyCorpus { .. } => "No text could be extracted from the PDF files. \
             Scanned or image-only PDFs are not supported."
            .to_string(),
        RagError::Extraction { document, message } => {
            format!("Could not read '{document}' as a PDF: {message}")
        }
        RagError::Config(message) => format!("Configuration problem: {message}"),
        RagError::IndexNotFound { .. } => "No PDF files have been processed yet. \
             Run `pdfqa ingest <FILE>...` first."
            .to_string(),
        RagError::IndexLoad { path, message } => format!(
            "The index at {path} cannot be used: {message}. Run `pdfqa ingest` to rebuild it."
        ),
        RagError::Persistence { path, message } => {
            format!("Could not save the index to {path}: {message}")
        }
        RagError::EmbeddingService { provider, message } => format!(
            "The embedding service ({provider}) failed: {message}. \
             Check your API key and try again."
        ),
        RagError::GenerationService { provider, message } => {
            format!("The answer service ({provider}) failed: {message}. Try again.")
        }
    }
}

/// Message and exit code for any error reaching `main`.
pub fn failure(err: &anyhow::Error) -> (String, u8) {
    match err.downcast_ref::<RagError>() {
        Some(rag) => (describe(rag), exit_code(rag.kind())),
        None => (format!("Error: {err:#}"), 1),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn every_kind_has_its_own_exit_code() {
        let kinds = [
            ErrorKind::InvalidInput,
            ErrorKind::Configuration,
            ErrorKind::Extraction,
            ErrorKind::IndexNotFound,
            ErrorKind::IndexLoad,
            ErrorKind::Persistence,
            ErrorKind::EmbeddingService,
            ErrorKind::GenerationService,
        ];
        let codes: HashSet<u8> = kinds.iter().map(|k| exit_code(*k)).collect();
        assert_eq!(codes.len(), kinds.len());
        assert!(!codes.contains(&0) && !codes.contains(&1));
    }

    #[test]
    fn missing_index_is_not_reported_as_service_failure() {
        let missing =
            describe(&RagError::IndexNotFound { name: "pdf_index".into(), path: ".".into() });
        assert!(missing.starts_with("No PDF files have been processed yet"));

        let service = describe(&RagError::EmbeddingService {
            provider: "Gemini".into(),
            message: "API returned 503".into(),
        });
        assert!(service.contains("503"));
        assert_ne!(missing, service);
    }

    #[test]
    fn rag_errors_survive_anyhow() {
        let err = anyhow::Error::new(RagError::EmptyQuestion);
        assert_eq!(failure(&err), ("Please enter a question.".to_string(), 2));
    }

    #[test]
    fn other_errors_use_generic_code() {
        let err = anyhow::anyhow!("stdout closed");
        assert_eq!(failure(&err).1, 1);
    }
}
