//! Vector index construction and similarity search.
//!
//! [`IndexBuilder`] embeds chunks in bounded, order-preserving batches and
//! assembles a [`VectorIndex`]. The index itself is a plain value; a
//! [`VectorStore`](crate::VectorStore) decides where it lives.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::deadline::with_deadline;
use crate::document::{Chunk, SearchResult};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};

/// Version of the on-disk layout written by this crate.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Descriptive header stored alongside the entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    /// Layout version, see [`INDEX_FORMAT_VERSION`].
    pub format_version: u32,
    /// Model id of the embedder that produced the vectors.
    pub embedder: String,
    /// Length of every stored vector.
    pub dimensions: usize,
    /// Number of stored chunks.
    pub chunk_count: usize,
    /// When the index was built.
    pub created_at: DateTime<Utc>,
}

/// A chunk with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The embedded chunk.
    pub chunk: Chunk,
    /// The chunk's embedding vector.
    pub embedding: Vec<f32>,
}

/// An immutable set of embedded chunks supporting nearest-neighbor search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorIndex {
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Pair chunks with their vectors, in order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingService`] if the counts differ, or if any
    /// vector is empty or differs in length from the first one.
    pub fn from_parts(embedder: &str, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(RagError::embedding(
                embedder,
                format!("received {} vectors for {} chunks", vectors.len(), chunks.len()),
            ));
        }

        let dimensions = vectors.first().map_or(0, Vec::len);
        if let Some(bad) = vectors.iter().position(|v| v.is_empty() || v.len() != dimensions) {
            return Err(RagError::embedding(
                embedder,
                format!(
                    "vector {bad} has {} dimensions, expected {dimensions}",
                    vectors[bad].len()
                ),
            ));
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        Ok(Self {
            manifest: IndexManifest {
                format_version: INDEX_FORMAT_VERSION,
                embedder: embedder.to_string(),
                dimensions,
                chunk_count: entries.len(),
                created_at: Utc::now(),
            },
            entries,
        })
    }

    /// The index header.
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// The stored entries, in chunk order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check internal consistency after deserialization.
    ///
    /// Returns a description of the first problem found.
    pub(crate) fn check(&self) -> std::result::Result<(), String> {
        let manifest = &self.manifest;
        if manifest.format_version != INDEX_FORMAT_VERSION {
            return Err(format!(
                "unsupported format version {} (expected {INDEX_FORMAT_VERSION})",
                manifest.format_version
            ));
        }
        if manifest.chunk_count != self.entries.len() {
            return Err(format!(
                "manifest lists {} chunks but {} are stored",
                manifest.chunk_count,
                self.entries.len()
            ));
        }
        if let Some(entry) = self.entries.iter().find(|e| e.embedding.len() != manifest.dimensions)
        {
            return Err(format!(
                "chunk {} has {} dimensions, expected {}",
                entry.chunk.index,
                entry.embedding.len(),
                manifest.dimensions
            ));
        }
        Ok(())
    }

    /// Return the `top_k` chunks most similar to `query`.
    ///
    /// Results are ordered by descending cosine similarity; equal scores keep
    /// chunk order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexLoad`] if the query vector's length differs
    /// from the index dimensions.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if !self.entries.is_empty() && query.len() != self.manifest.dimensions {
            return Err(RagError::IndexLoad {
                path: "in-memory index".to_string(),
                message: format!(
                    "query vector has {} dimensions but the index stores {}",
                    query.len(),
                    self.manifest.dimensions
                ),
            });
        }

        let mut scored: Vec<SearchResult> = self
            .entries
            .iter()
            .map(|entry| SearchResult {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(&entry.embedding, query),
            })
            .collect();

        // Stable sort: ties stay in chunk order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Embeds chunks and assembles a [`VectorIndex`].
///
/// Chunks are sent in batches of `batch_size`; up to `concurrency` batches
/// are in flight at once. Results are reassembled in submission order, so
/// every chunk keeps its own vector regardless of which request finishes
/// first. Any failed or timed-out batch aborts the build.
pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    concurrency: usize,
    timeout: Duration,
}

impl IndexBuilder {
    /// Create a builder with one request at a time, batches of 100 and a
    /// 60 second timeout.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder, batch_size: 100, concurrency: 1, timeout: Duration::from_secs(60) }
    }

    /// Set the number of chunks per embedding request (minimum 1).
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set how many embedding requests may run at once (minimum 1).
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the time limit for each embedding request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Embed every chunk and build the index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingService`] if any request fails, times
    /// out, or returns the wrong number of vectors.
    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<VectorIndex> {
        let model = self.embedder.model_id().to_string();
        let batch_count = chunks.len().div_ceil(self.batch_size);
        debug!(
            embedder = %model,
            chunk_count = chunks.len(),
            batch_count,
            concurrency = self.concurrency,
            "embedding chunks"
        );

        let batches: Vec<Vec<Vec<f32>>> = stream::iter(chunks.chunks(self.batch_size))
            .map(|batch| self.embed_batch(batch))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let vectors: Vec<Vec<f32>> = batches.into_iter().flatten().collect();
        let index = VectorIndex::from_parts(&model, chunks, vectors)?;
        info!(
            embedder = %model,
            chunk_count = index.len(),
            dimensions = index.manifest().dimensions,
            "built vector index"
        );
        Ok(index)
    }

    async fn embed_batch(&self, batch: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let model = self.embedder.model_id();
        let vectors = with_deadline(self.timeout, self.embedder.embed_batch(&texts), |message| {
            RagError::embedding(model, message)
        })
        .await?;

        if vectors.len() != texts.len() {
            return Err(RagError::embedding(
                model,
                format!("received {} vectors for a batch of {}", vectors.len(), texts.len()),
            ));
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk { index, text: text.to_string() }
    }

    fn numbered_chunks(count: usize) -> Vec<Chunk> {
        (0..count).map(|i| chunk(i, &i.to_string())).collect()
    }

    /// Embeds the number a chunk's text spells as `[n, 1.0]`.
    ///
    /// Batches starting at a lower number sleep longer, so they finish last.
    /// Records the first number of each batch as it completes.
    #[derive(Default)]
    struct NumberEmbedder {
        finished: Mutex<Vec<usize>>,
        fail_on: Option<usize>,
        drop_last: bool,
    }

    #[async_trait]
    impl Embedder for NumberEmbedder {
        fn model_id(&self) -> &str {
            "numbers"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let n: usize = text.parse().map_err(|_| RagError::embedding("numbers", text))?;
            Ok(vec![n as f32, 1.0])
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            let first: usize = texts[0].parse().unwrap();
            tokio::time::sleep(Duration::from_millis(100 - first as u64 * 5)).await;

            let mut vectors = Vec::with_capacity(texts.len());
            for text in texts {
                if self.fail_on.is_some_and(|n| n.to_string() == *text) {
                    return Err(RagError::embedding("numbers", "quota exceeded"));
                }
                vectors.push(self.embed(text).await?);
            }
            if self.drop_last {
                vectors.pop();
            }
            self.finished.lock().unwrap().push(first);
            Ok(vectors)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_order_batches_keep_chunk_vector_pairing() {
        let embedder = Arc::new(NumberEmbedder::default());
        let index = IndexBuilder::new(embedder.clone())
            .batch_size(2)
            .concurrency(6)
            .build(numbered_chunks(12))
            .await
            .unwrap();

        // All six batches ran at once and completed in reverse.
        assert_eq!(*embedder.finished.lock().unwrap(), vec![10, 8, 6, 4, 2, 0]);

        assert_eq!(index.len(), 12);
        assert_eq!(index.manifest().dimensions, 2);
        for (position, entry) in index.entries().iter().enumerate() {
            assert_eq!(entry.chunk.index, position);
            assert_eq!(entry.embedding[0], entry.chunk.index as f32);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failing_later_batch_aborts_build() {
        let embedder = Arc::new(NumberEmbedder { fail_on: Some(7), ..Default::default() });
        let err = IndexBuilder::new(embedder)
            .batch_size(2)
            .concurrency(3)
            .build(numbered_chunks(12))
            .await
            .unwrap_err();
        assert!(
            matches!(err, RagError::EmbeddingService { message, .. } if message == "quota exceeded")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn short_batch_response_is_rejected() {
        let embedder = Arc::new(NumberEmbedder { drop_last: true, ..Default::default() });
        let err =
            IndexBuilder::new(embedder).batch_size(4).build(numbered_chunks(4)).await.unwrap_err();
        let RagError::EmbeddingService { message, .. } = &err else {
            panic!("expected an embedding error, got {err:?}");
        };
        assert!(message.contains("batch of 4"), "{message}");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_batch_times_out() {
        let embedder = Arc::new(NumberEmbedder::default());
        let err = IndexBuilder::new(embedder)
            .timeout(Duration::from_millis(10))
            .build(numbered_chunks(3))
            .await
            .unwrap_err();
        let RagError::EmbeddingService { message, .. } = &err else {
            panic!("expected an embedding error, got {err:?}");
        };
        assert!(message.contains("timed out"), "{message}");
    }

    fn index_of(vectors: Vec<Vec<f32>>) -> VectorIndex {
        let chunks = (0..vectors.len()).map(|i| chunk(i, &format!("chunk {i}"))).collect();
        VectorIndex::from_parts("test-embedder", chunks, vectors).unwrap()
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let score = cosine_similarity(&[0.3, 0.4], &[0.3, 0.4]);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn search_ranks_by_similarity() {
        let index = index_of(vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]]);
        let results = index.search(&[1.0, 0.1], 2).unwrap();
        let order: Vec<usize> = results.iter().map(|r| r.chunk.index).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn ties_keep_chunk_order() {
        let index = index_of(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![2.0, 0.0]]);
        let results = index.search(&[1.0, 0.0], 4).unwrap();
        let order: Vec<usize> = results.iter().map(|r| r.chunk.index).collect();
        assert_eq!(order, vec![0, 2, 3, 1]);
    }

    #[test]
    fn top_k_larger_than_index_returns_everything() {
        let index = index_of(vec![vec![1.0], vec![0.5]]);
        assert_eq!(index.search(&[1.0], 10).unwrap().len(), 2);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let index = index_of(vec![vec![1.0, 0.0]]);
        let err = index.search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, RagError::IndexLoad { .. }));
    }

    #[test]
    fn from_parts_rejects_count_mismatch() {
        let err = VectorIndex::from_parts("m", vec![chunk(0, "a")], vec![]).unwrap_err();
        assert!(matches!(err, RagError::EmbeddingService { .. }));
    }

    #[test]
    fn from_parts_rejects_ragged_vectors() {
        let err = VectorIndex::from_parts(
            "m",
            vec![chunk(0, "a"), chunk(1, "b")],
            vec![vec![1.0, 2.0], vec![1.0]],
        )
        .unwrap_err();
        let RagError::EmbeddingService { message, .. } = &err else {
            panic!("expected an embedding error, got {err:?}");
        };
        assert!(message.contains("vector 1"), "{message}");
    }

    #[test]
    fn manifest_describes_contents() {
        let index = index_of(vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
        let manifest = index.manifest();
        assert_eq!(manifest.format_version, INDEX_FORMAT_VERSION);
        assert_eq!(manifest.embedder, "test-embedder");
        assert_eq!(manifest.dimensions, 3);
        assert_eq!(manifest.chunk_count, 2);
        assert!(index.check().is_ok());
    }
}
