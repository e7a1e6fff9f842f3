//! Configuration for the RAG pipeline.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default maximum chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 1_000;
/// Default number of chunks handed to the answer synthesizer.
pub const DEFAULT_TOP_K: usize = 4;
/// Default sampling temperature for answer generation.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
/// Default name of the persisted index.
pub const DEFAULT_INDEX_NAME: &str = "pdf_index";

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of top results to return from vector search.
    pub top_k: usize,
    /// Sampling temperature passed to the generative service.
    pub temperature: f32,
    /// Upper bound on every embedding or generation call.
    pub service_timeout: Duration,
    /// Number of chunks sent per embedding request.
    pub embed_batch_size: usize,
    /// Number of embedding requests allowed in flight at once.
    pub embed_concurrency: usize,
    /// Directory holding the persisted index.
    pub index_dir: PathBuf,
    /// Name of the persisted index inside `index_dir`.
    pub index_name: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            temperature: DEFAULT_TEMPERATURE,
            service_timeout: Duration::from_secs(60),
            embed_batch_size: 100,
            embed_concurrency: 4,
            index_dir: PathBuf::from("."),
            index_name: DEFAULT_INDEX_NAME.to_string(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Build a validated configuration from the process environment.
    ///
    /// Unset variables keep their defaults. See [`RagConfigBuilder::from_lookup`].
    pub fn from_env() -> Result<Self> {
        RagConfigBuilder::from_lookup(|key| std::env::var(key).ok())?.build()
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k`, `embed_batch_size`, `embed_concurrency` or
    ///   `service_timeout` is zero
    /// - `temperature` is not within `0.0..=2.0`
    /// - `index_name` is empty or contains a path separator
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::Config(format!(
                "temperature ({}) must be between 0.0 and 2.0",
                self.temperature
            )));
        }
        if self.service_timeout.is_zero() {
            return Err(RagError::Config("service_timeout must be greater than zero".to_string()));
        }
        if self.embed_batch_size == 0 {
            return Err(RagError::Config("embed_batch_size must be greater than zero".to_string()));
        }
        if self.embed_concurrency == 0 {
            return Err(RagError::Config(
                "embed_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.index_name.is_empty() || self.index_name.contains(['/', '\\']) {
            return Err(RagError::Config(format!(
                "index_name '{}' must be a non-empty file name",
                self.index_name
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Start from defaults and apply `PDFQA_*` overrides returned by `lookup`.
    ///
    /// Recognised keys: `PDFQA_CHUNK_SIZE`, `PDFQA_CHUNK_OVERLAP`,
    /// `PDFQA_TOP_K`, `PDFQA_TEMPERATURE`, `PDFQA_SERVICE_TIMEOUT_SECS`,
    /// `PDFQA_EMBED_BATCH_SIZE`, `PDFQA_EMBED_CONCURRENCY`,
    /// `PDFQA_INDEX_DIR`, `PDFQA_INDEX_NAME`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a value cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = RagConfig::default();

        if let Some(v) = parse_var(&lookup, "PDFQA_CHUNK_SIZE")? {
            config.chunk_size = v;
        }
        if let Some(v) = parse_var(&lookup, "PDFQA_CHUNK_OVERLAP")? {
            config.chunk_overlap = v;
        }
        if let Some(v) = parse_var(&lookup, "PDFQA_TOP_K")? {
            config.top_k = v;
        }
        if let Some(v) = parse_var(&lookup, "PDFQA_TEMPERATURE")? {
            config.temperature = v;
        }
        if let Some(secs) = parse_var(&lookup, "PDFQA_SERVICE_TIMEOUT_SECS")? {
            config.service_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = parse_var(&lookup, "PDFQA_EMBED_BATCH_SIZE")? {
            config.embed_batch_size = v;
        }
        if let Some(v) = parse_var(&lookup, "PDFQA_EMBED_CONCURRENCY")? {
            config.embed_concurrency = v;
        }
        if let Some(dir) = non_blank(&lookup, "PDFQA_INDEX_DIR") {
            config.index_dir = PathBuf::from(dir);
        }
        if let Some(name) = non_blank(&lookup, "PDFQA_INDEX_NAME") {
            config.index_name = name;
        }

        Ok(Self { config })
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of top results to return from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the generation temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the per-call service timeout. Sub-second values are kept as given.
    pub fn service_timeout(mut self, timeout: Duration) -> Self {
        self.config.service_timeout = timeout;
        self
    }

    /// Set how many chunks go into one embedding request.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set how many embedding requests may run concurrently.
    pub fn embed_concurrency(mut self, concurrency: usize) -> Self {
        self.config.embed_concurrency = concurrency;
        self
    }

    /// Set the directory holding the persisted index.
    pub fn index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.index_dir = dir.into();
        self
    }

    /// Set the name of the persisted index.
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.config.index_name = name.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn non_blank(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = non_blank(lookup, key) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| RagError::Config(format!("{key}='{raw}' is invalid: {e}")))
}
