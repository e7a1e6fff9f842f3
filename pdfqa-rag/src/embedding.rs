//! Embedding service trait for turning text into vectors.

use async_trait::async_trait;

use crate::error::Result;

/// A service that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (Gemini, OpenAI, etc.)
/// behind a unified async interface. [`embed`](Embedder::embed) is used for
/// queries and [`embed_batch`](Embedder::embed_batch) for document chunks,
/// so backends with asymmetric retrieval task types can tell them apart.
///
/// The default `embed_batch` calls `embed` sequentially; backends that
/// support native batching should override it. Either way the returned
/// vectors must be in input order.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::Embedder;
///
/// let embedder = GeminiEmbedder::new(client);
/// let vector = embedder.embed("What is the capital of France?").await?;
/// ```
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier of the embedding model, recorded in the persisted index.
    ///
    /// Vectors from different models are not comparable, so an index built
    /// with one model is rejected when queried with another.
    fn model_id(&self) -> &str;

    /// Generate an embedding vector for a single query string.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of document chunks.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}
