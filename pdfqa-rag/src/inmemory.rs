//! In-memory vector store.
//!
//! This module provides [`InMemoryVectorStore`], a [`VectorStore`] backed by
//! a `HashMap` protected by a `tokio::sync::RwLock`. Indexes live only as
//! long as the store; it is suitable for tests and for programs that rebuild
//! their index on every start.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::store::VectorStore;

/// An in-memory [`VectorStore`].
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.save("pdf_index", &index).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    indexes: RwLock<HashMap<String, VectorIndex>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.indexes.read().await.contains_key(name))
    }

    async fn save(&self, name: &str, index: &VectorIndex) -> Result<()> {
        // The swap happens under the write lock, so readers never see a partial index.
        self.indexes.write().await.insert(name.to_string(), index.clone());
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<VectorIndex> {
        self.indexes.read().await.get(name).cloned().ok_or_else(|| RagError::IndexNotFound {
            name: name.to_string(),
            path: self.location(name),
        })
    }

    fn location(&self, name: &str) -> String {
        format!("memory://{name}")
    }
}
