//! Deterministic stand-ins for the hosted services.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pdfqa_rag::{
    Embedder, Generator, InMemoryVectorStore, RagConfig, RagError, RagPipeline, Result,
    SourceDocument, TextExtractor, UNAVAILABLE_ANSWER, VectorStore,
};

pub const DIMENSIONS: usize = 64;

/// Lowercased alphanumeric words of `text`.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Hashes each word into one of [`DIMENSIONS`] buckets and counts occurrences.
///
/// Texts sharing vocabulary land close together, which is enough for
/// retrieval tests to be meaningful without a network.
#[derive(Default)]
pub struct BagOfWordsEmbedder {
    pub query_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub fail: AtomicBool,
    /// Delay applied to query embeddings.
    pub query_delay: Option<Duration>,
}

impl BagOfWordsEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slow_queries(delay: Duration) -> Arc<Self> {
        Arc::new(Self { query_delay: Some(delay), ..Self::default() })
    }

    pub fn calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst) + self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    fn vectorize(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::EmbeddingService {
                provider: "bag-of-words".into(),
                message: "service unavailable".into(),
            });
        }
        let mut vector = vec![0.0; DIMENSIONS];
        for word in words(text) {
            let bucket =
                word.bytes().fold(7u32, |h, b| h.wrapping_mul(31).wrapping_add(u32::from(b)));
            vector[bucket as usize % DIMENSIONS] += 1.0;
        }
        // Keep every vector non-zero so cosine similarity is defined.
        vector[0] += 0.01;
        Ok(vector)
    }
}

#[async_trait]
impl Embedder for BagOfWordsEmbedder {
    fn model_id(&self) -> &str {
        "bag-of-words"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.query_delay {
            tokio::time::sleep(delay).await;
        }
        self.vectorize(text)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        texts.iter().map(|t| self.vectorize(t)).collect()
    }
}

/// Answers with the context sentence sharing the most significant words with
/// the question, or the sentinel phrase when none does.
#[derive(Default)]
pub struct ContextEchoGenerator {
    pub calls: AtomicUsize,
    pub last_prompt: std::sync::Mutex<String>,
}

impl ContextEchoGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn section<'a>(prompt: &'a str, start: &str, end: &str) -> &'a str {
    let Some(from) = prompt.find(start).map(|i| i + start.len()) else {
        return "";
    };
    let rest = &prompt[from..];
    rest.find(end).map_or(rest, |to| &rest[..to])
}

#[async_trait]
impl Generator for ContextEchoGenerator {
    fn model_id(&self) -> &str {
        "context-echo"
    }

    async fn generate(&self, prompt: &str, _temperature: f32) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = prompt.to_string();

        let context = section(prompt, "Context:\n", "\n\nQuestion:\n");
        let question = section(prompt, "Question:\n", "\n\nAnswer:");
        let keywords: Vec<String> = words(question).into_iter().filter(|w| w.len() > 3).collect();

        let best = context
            .split_inclusive(['.', '\n'])
            .map(|sentence| {
                let found = words(sentence);
                (keywords.iter().filter(|k| found.contains(k)).count(), sentence.trim())
            })
            .filter(|(hits, _)| *hits > 0)
            .max_by_key(|(hits, _)| *hits);

        Ok(best.map_or_else(|| UNAVAILABLE_ANSWER.to_string(), |(_, s)| s.to_string()))
    }
}

/// Treats document bytes as UTF-8 text, one page per form feed.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_pages(&self, document: &SourceDocument) -> Result<Vec<String>> {
        let text = std::str::from_utf8(&document.bytes).map_err(|e| RagError::Extraction {
            document: document.name.clone(),
            message: e.to_string(),
        })?;
        Ok(text.split('\u{c}').map(str::to_string).collect())
    }
}

pub fn doc(name: &str, text: &str) -> SourceDocument {
    SourceDocument::new(name, text.as_bytes())
}

pub struct Harness {
    pub embedder: Arc<BagOfWordsEmbedder>,
    pub generator: Arc<ContextEchoGenerator>,
    pub store: Arc<dyn VectorStore>,
    pub pipeline: RagPipeline,
}

impl Harness {
    pub fn in_memory(config: RagConfig) -> Self {
        Self::with_store(config, Arc::new(InMemoryVectorStore::new()), BagOfWordsEmbedder::new())
    }

    pub fn with_store(
        config: RagConfig,
        store: Arc<dyn VectorStore>,
        embedder: Arc<BagOfWordsEmbedder>,
    ) -> Self {
        let generator = ContextEchoGenerator::new();
        let pipeline = RagPipeline::builder()
            .config(config)
            .extractor(Arc::new(PlainTextExtractor))
            .embedder(embedder.clone())
            .generator(generator.clone())
            .vector_store(Arc::clone(&store))
            .build()
            .unwrap();
        Self { embedder, generator, store, pipeline }
    }
}
