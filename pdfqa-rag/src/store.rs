//! Persistent storage for named vector indexes.
//!
//! [`FileVectorStore`] keeps each index as one JSON file,
//! `<dir>/<name>.json`. Saving writes a temporary file in the same
//! directory and renames it over the target, so a reader in another process
//! sees either the previous index or the new one, never a mix.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// Storage for named [`VectorIndex`]es.
///
/// Implementations replace an index wholesale on [`save`](VectorStore::save);
/// there is no partial update.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{FileVectorStore, VectorStore};
///
/// let store = FileVectorStore::new("./indexes");
/// store.save("pdf_index", &index).await?;
/// let index = store.load("pdf_index").await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Whether an index called `name` has been saved.
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Publish `index` under `name`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Persistence`] if the index cannot be written; the
    /// previous index, if any, is left untouched.
    async fn save(&self, name: &str, index: &VectorIndex) -> Result<()>;

    /// Load the index called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexNotFound`] if nothing was saved under `name`,
    /// or [`RagError::IndexLoad`] if it exists but is unreadable or corrupt.
    async fn load(&self, name: &str) -> Result<VectorIndex>;

    /// Human-readable location of `name`, for messages.
    fn location(&self, name: &str) -> String;
}

/// A [`VectorStore`] writing one JSON file per index into a directory.
#[derive(Debug, Clone)]
pub struct FileVectorStore {
    dir: PathBuf,
}

impl FileVectorStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `name`.
    pub fn index_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl VectorStore for FileVectorStore {
    async fn exists(&self, name: &str) -> Result<bool> {
        let path = self.index_path(name);
        tokio::fs::try_exists(&path).await.map_err(|e| RagError::IndexLoad {
            path: path.display().to_string(),
            message: format!("cannot inspect index location: {e}"),
        })
    }

    async fn save(&self, name: &str, index: &VectorIndex) -> Result<()> {
        let dir = self.dir.clone();
        let path = self.index_path(name);
        let index = index.clone();

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&dir, &target, &index))
            .await
            .map_err(|e| RagError::Persistence {
                path: path.display().to_string(),
                message: format!("writer task failed: {e}"),
            })?
            .inspect_err(|e| error!(path = %path.display(), error = %e, "failed to save index"))?;

        info!(path = %path.display(), "published index");
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<VectorIndex> {
        let path = self.index_path(name);
        let name = name.to_string();

        let target = path.clone();
        tokio::task::spawn_blocking(move || read_index(&name, &target)).await.map_err(|e| {
            RagError::IndexLoad {
                path: path.display().to_string(),
                message: format!("reader task failed: {e}"),
            }
        })?
    }

    fn location(&self, name: &str) -> String {
        self.index_path(name).display().to_string()
    }
}

fn write_atomically(dir: &Path, path: &Path, index: &VectorIndex) -> Result<()> {
    let persistence = |message: String| RagError::Persistence {
        path: path.display().to_string(),
        message,
    };

    std::fs::create_dir_all(dir)
        .map_err(|e| persistence(format!("cannot create {}: {e}", dir.display())))?;

    // Same directory as the target so the final rename never crosses filesystems.
    let temp = NamedTempFile::new_in(dir)
        .map_err(|e| persistence(format!("cannot create temporary file: {e}")))?;
    debug!(temp = %temp.path().display(), "writing index to temporary file");

    {
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer(&mut writer, index)
            .map_err(|e| persistence(format!("cannot serialize index: {e}")))?;
        writer.flush().map_err(|e| persistence(format!("cannot write index: {e}")))?;
    }
    temp.as_file().sync_all().map_err(|e| persistence(format!("cannot sync index: {e}")))?;

    temp.persist(path).map_err(|e| persistence(format!("cannot replace index: {}", e.error)))?;
    Ok(())
}

fn read_index(name: &str, path: &Path) -> Result<VectorIndex> {
    let load_error = |message: String| RagError::IndexLoad {
        path: path.display().to_string(),
        message,
    };

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            return Err(RagError::IndexNotFound {
                name: name.to_string(),
                path: path.display().to_string(),
            });
        }
        Err(e) => return Err(load_error(format!("cannot open index: {e}"))),
    };

    let index: VectorIndex = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| load_error(format!("index is corrupt: {e}")))?;
    index.check().map_err(|message| load_error(format!("index is inconsistent: {message}")))?;

    debug!(path = %path.display(), chunk_count = index.len(), "loaded index");
    Ok(index)
}
