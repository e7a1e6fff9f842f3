//! Gemini embedding and generation over the Generative Language REST API.
//!
//! This module is only available when the `gemini` feature is enabled.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::generation::Generator;

/// The default Generative Language API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default Gemini embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/embedding-001";

/// The default Gemini generation model.
pub const DEFAULT_GENERATION_MODEL: &str = "models/gemini-2.0-flash";

/// `batchEmbedContents` accepts at most this many requests per call.
const MAX_BATCH_SIZE: usize = 100;

const PROVIDER: &str = "Gemini";

/// Shared HTTP client carrying the API key.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    /// Create a client authenticating with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the key is empty or not a valid header value.
    pub fn new(api_key: impl AsRef<str>) -> Result<Self> {
        let api_key = api_key.as_ref().trim();
        if api_key.is_empty() {
            return Err(RagError::Config("Gemini API key must not be empty".into()));
        }

        let mut value = HeaderValue::from_str(api_key)
            .map_err(|e| RagError::Config(format!("Gemini API key is not a valid header: {e}")))?;
        value.set_sensitive(true);
        let headers = HeaderMap::from_iter([(HeaderName::from_static("x-goog-api-key"), value)]);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, base_url: DEFAULT_BASE_URL.to_string() })
    }

    /// Point the client at a different endpoint (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!("{}/{model}:{method}", self.base_url)
    }

    /// POST a JSON body and decode a JSON response, describing failures as text.
    async fn post_json<Req, Res>(&self, url: &str, body: &Req) -> std::result::Result<Res, String>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(format!("API returned {status}: {detail}"));
        }

        response.json().await.map_err(|e| format!("failed to parse response: {e}"))
    }
}

/// Ensure a model name carries the `models/` resource prefix.
fn model_resource(model: &str) -> String {
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

// ── API request/response types ──────────────────────────────────────

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Serialize)]
struct BatchEmbedContentsRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── Embedder ────────────────────────────────────────────────────────

/// An [`Embedder`] backed by the Gemini embedding API.
///
/// Queries are embedded with task type `RETRIEVAL_QUERY` and chunks with
/// `RETRIEVAL_DOCUMENT`.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::gemini::{GeminiClient, GeminiEmbedder};
///
/// let embedder = GeminiEmbedder::new(GeminiClient::new("your-api-key")?);
/// let vector = embedder.embed("hello world").await?;
/// ```
#[derive(Debug, Clone)]
pub struct GeminiEmbedder {
    client: GeminiClient,
    model: String,
}

impl GeminiEmbedder {
    /// Create an embedder using `models/embedding-001`.
    pub fn new(client: GeminiClient) -> Self {
        Self { client, model: DEFAULT_EMBEDDING_MODEL.to_string() }
    }

    /// Use a different embedding model (e.g. `text-embedding-004`).
    pub fn with_model(mut self, model: impl AsRef<str>) -> Self {
        self.model = model_resource(model.as_ref());
        self
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, model = %self.model, text_len = text.len(), "embedding query");

        let request = EmbedContentRequest {
            model: &self.model,
            content: Content { role: None, parts: vec![Part { text }] },
            task_type: "RETRIEVAL_QUERY",
        };
        let url = self.client.url(&self.model, "embedContent");
        let response: EmbedContentResponse =
            self.client.post_json(&url, &request).await.map_err(|message| {
                error!(provider = PROVIDER, error = %message, "embedding request failed");
                RagError::embedding(PROVIDER, message)
            })?;

        if response.embedding.values.is_empty() {
            return Err(RagError::embedding(PROVIDER, "API returned an empty embedding"));
        }
        Ok(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.client.url(&self.model, "batchEmbedContents");
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_BATCH_SIZE) {
            debug!(
                provider = PROVIDER,
                model = %self.model,
                batch_size = batch.len(),
                "embedding batch"
            );

            let request = BatchEmbedContentsRequest {
                requests: batch
                    .iter()
                    .map(|text| EmbedContentRequest {
                        model: &self.model,
                        content: Content { role: None, parts: vec![Part { text }] },
                        task_type: "RETRIEVAL_DOCUMENT",
                    })
                    .collect(),
            };
            let response: BatchEmbedContentsResponse =
                self.client.post_json(&url, &request).await.map_err(|message| {
                    error!(provider = PROVIDER, error = %message, "batch embedding request failed");
                    RagError::embedding(PROVIDER, message)
                })?;

            if response.embeddings.len() != batch.len() {
                return Err(RagError::embedding(
                    PROVIDER,
                    format!(
                        "API returned {} embeddings for {} inputs",
                        response.embeddings.len(),
                        batch.len()
                    ),
                ));
            }
            vectors.extend(response.embeddings.into_iter().map(|e| e.values));
        }

        Ok(vectors)
    }
}

// ── Generator ───────────────────────────────────────────────────────

/// A [`Generator`] backed by Gemini `generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: GeminiClient,
    model: String,
}

impl GeminiGenerator {
    /// Create a generator using `models/gemini-2.0-flash`.
    pub fn new(client: GeminiClient) -> Self {
        Self { client, model: DEFAULT_GENERATION_MODEL.to_string() }
    }

    /// Use a different generation model.
    pub fn with_model(mut self, model: impl AsRef<str>) -> Self {
        self.model = model_resource(model.as_ref());
        self
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        debug!(
            provider = PROVIDER,
            model = %self.model,
            prompt_len = prompt.len(),
            temperature,
            "generating"
        );

        let request = GenerateContentRequest {
            contents: vec![Content { role: Some("user"), parts: vec![Part { text: prompt }] }],
            generation_config: GenerationConfig { temperature },
        };
        let url = self.client.url(&self.model, "generateContent");
        let response: GenerateContentResponse =
            self.client.post_json(&url, &request).await.map_err(|message| {
                error!(provider = PROVIDER, error = %message, "generation request failed");
                RagError::generation(PROVIDER, message)
            })?;

        let block_reason = response.prompt_feedback.and_then(|f| f.block_reason);
        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = block_reason.map_or_else(
                || "API returned no candidates".to_string(),
                |r| format!("prompt was blocked: {r}"),
            );
            return Err(RagError::generation(PROVIDER, reason));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
            return Err(RagError::generation(
                PROVIDER,
                format!("API returned no content (finish reason: {reason})"),
            ));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_gain_resource_prefix() {
        assert_eq!(model_resource("embedding-001"), "models/embedding-001");
        assert_eq!(model_resource("models/gemini-2.0-flash"), "models/gemini-2.0-flash");
    }

    #[test]
    fn urls_join_model_and_method() {
        let client = GeminiClient::new("key").unwrap().with_base_url("http://localhost:9/v1beta/");
        assert_eq!(
            client.url("models/embedding-001", "embedContent"),
            "http://localhost:9/v1beta/models/embedding-001:embedContent"
        );
    }

    #[test]
    fn blank_key_rejected() {
        assert!(matches!(GeminiClient::new("   "), Err(RagError::Config(_))));
    }

    #[test]
    fn generation_request_uses_camel_case() {
        let request = GenerateContentRequest {
            contents: vec![Content { role: Some("user"), parts: vec![Part { text: "hi" }] }],
            generation_config: GenerationConfig { temperature: 0.5 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["temperature"], 0.5);
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
    }
}
