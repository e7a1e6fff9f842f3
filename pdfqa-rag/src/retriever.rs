//! Query-side retrieval against a persisted index.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::deadline::with_deadline;
use crate::document::SearchResult;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::store::VectorStore;

/// Loads a named index and returns the chunks most similar to a query.
///
/// The index is re-opened on every call: it may have been rebuilt by another
/// process since the last query.
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    index_name: String,
    top_k: usize,
    timeout: Duration,
}

impl Retriever {
    /// Create a retriever over the index called `index_name` in `store`.
    ///
    /// Defaults to the 4 best chunks and a 60 second embedding timeout.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        index_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            index_name: index_name.into(),
            top_k: crate::config::DEFAULT_TOP_K,
            timeout: Duration::from_secs(60),
        }
    }

    /// Set how many chunks to return (minimum 1).
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Set the time limit for the query embedding call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Return the `top_k` chunks most similar to `query`.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexNotFound`] if no index has been saved yet; checked
    ///   before any embedding call is made.
    /// - [`RagError::IndexLoad`] if the index is corrupt or was built with a
    ///   different embedding model.
    /// - [`RagError::EmbeddingService`] if embedding the query fails or times out.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.retrieve_top(query, self.top_k).await
    }

    /// Like [`retrieve`](Self::retrieve) with an explicit result count.
    pub async fn retrieve_top(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let name = self.index_name.as_str();
        if !self.store.exists(name).await? {
            return Err(RagError::IndexNotFound {
                name: name.to_string(),
                path: self.store.location(name),
            });
        }

        let index = self.store.load(name).await?;
        let built_with = &index.manifest().embedder;
        let model = self.embedder.model_id();
        if built_with != model {
            return Err(RagError::IndexLoad {
                path: self.store.location(name),
                message: format!(
                    "index was built with embedder '{built_with}' but queries use '{model}'; \
                     re-ingest the documents"
                ),
            });
        }

        debug!(index = name, chunk_count = index.len(), "embedding query");
        let query_vector = with_deadline(self.timeout, self.embedder.embed(query), |message| {
            RagError::embedding(model, message)
        })
        .await?;

        let results = index.search(&query_vector, top_k).map_err(|e| match e {
            RagError::IndexLoad { message, .. } => {
                RagError::IndexLoad { path: self.store.location(name), message }
            }
            other => other,
        })?;

        info!(index = name, result_count = results.len(), "retrieved chunks");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::document::Chunk;
    use crate::index::VectorIndex;
    use crate::inmemory::InMemoryVectorStore;

    /// Embeds "north"/"east" as unit axes and counts calls.
    #[derive(Default)]
    struct CompassEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CompassEmbedder {
        fn model_id(&self) -> &str {
            "compass"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(if text.contains("north") { vec![0.0, 1.0] } else { vec![1.0, 0.0] })
        }
    }

    async fn store_with(embedder: &str) -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        let index = VectorIndex::from_parts(
            embedder,
            vec![
                Chunk { index: 0, text: "east wing".into() },
                Chunk { index: 1, text: "north tower".into() },
            ],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        )
        .unwrap();
        store.save("pdf_index", &index).await.unwrap();
        store
    }

    #[tokio::test]
    async fn missing_index_fails_before_embedding() {
        let embedder = Arc::new(CompassEmbedder::default());
        let retriever =
            Retriever::new(Arc::new(InMemoryVectorStore::new()), embedder.clone(), "pdf_index");

        let err = retriever.retrieve("go north").await.unwrap_err();
        assert!(matches!(err, RagError::IndexNotFound { .. }));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn returns_most_similar_first() {
        let store = store_with("compass").await;
        let retriever = Retriever::new(store, Arc::new(CompassEmbedder::default()), "pdf_index");

        let results = retriever.retrieve("go north").await.unwrap();
        assert_eq!(results[0].chunk.text, "north tower");
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn top_k_limits_results() {
        let store = store_with("compass").await;
        let retriever =
            Retriever::new(store, Arc::new(CompassEmbedder::default()), "pdf_index").top_k(1);

        assert_eq!(retriever.retrieve("east").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn index_from_other_embedder_is_incompatible() {
        let store = store_with("some-other-model").await;
        let embedder = Arc::new(CompassEmbedder::default());
        let retriever = Retriever::new(store, embedder.clone(), "pdf_index");

        let err = retriever.retrieve("north").await.unwrap_err();
        let RagError::IndexLoad { message, .. } = &err else {
            panic!("expected an index load error, got {err:?}");
        };
        assert!(message.contains("some-other-model"), "{message}");
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }
}
