//! Selection and construction of the hosted embedding and generation services.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::generation::Generator;

/// A hosted model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    /// Google Generative Language API.
    #[default]
    Gemini,
    /// OpenAI API.
    OpenAi,
}

impl Provider {
    /// Environment variable holding this provider's API key.
    pub fn credential_var(self) -> &'static str {
        match self {
            Provider::Gemini => "GOOGLE_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }

    /// The sample value shipped in example `.env` files.
    fn placeholder(self) -> &'static str {
        match self {
            Provider::Gemini => "your_google_api_key_here",
            Provider::OpenAi => "your_openai_api_key_here",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
        })
    }
}

impl FromStr for Provider {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            other => Err(RagError::Config(format!(
                "unknown provider '{other}' (expected 'gemini' or 'openai')"
            ))),
        }
    }
}

/// Which provider to use and how to reach it.
///
/// The credential is validated when the value is built, so a missing key is
/// reported before any document is read or any request is sent.
#[derive(Clone)]
pub struct ProviderConfig {
    /// The selected provider.
    pub provider: Provider,
    api_key: String,
    /// Overrides the provider's default embedding model.
    pub embedding_model: Option<String>,
    /// Overrides the provider's default generation model.
    pub generation_model: Option<String>,
    /// Overrides the provider's API endpoint.
    pub base_url: Option<String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("embedding_model", &self.embedding_model)
            .field("generation_model", &self.generation_model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ProviderConfig {
    /// Create a configuration for `provider` authenticated with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the key is blank or still the
    /// placeholder value.
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() || api_key == provider.placeholder() {
            return Err(RagError::Config(format!(
                "{} is not set; add it to the environment or a .env file",
                provider.credential_var()
            )));
        }
        Ok(Self {
            provider,
            api_key,
            embedding_model: None,
            generation_model: None,
            base_url: None,
        })
    }

    /// Read the provider settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read `PDFQA_PROVIDER`, the matching credential variable and the
    /// optional `PDFQA_EMBEDDING_MODEL`, `PDFQA_GENERATION_MODEL` and
    /// `PDFQA_BASE_URL` overrides through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let set = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = match set("PDFQA_PROVIDER") {
            Some(name) => name.parse()?,
            None => Provider::default(),
        };
        let api_key = set(provider.credential_var()).unwrap_or_default();

        let mut config = Self::new(provider, api_key)?;
        config.embedding_model = set("PDFQA_EMBEDDING_MODEL");
        config.generation_model = set("PDFQA_GENERATION_MODEL");
        config.base_url = set("PDFQA_BASE_URL");
        Ok(config)
    }

    /// Override the embedding model.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Override the generation model.
    pub fn with_generation_model(mut self, model: impl Into<String>) -> Self {
        self.generation_model = Some(model.into());
        self
    }

    /// Override the API endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Build the embedding and generation services for this provider.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the provider was compiled out or the
    /// HTTP client cannot be constructed.
    pub fn build_services(&self) -> Result<(Arc<dyn Embedder>, Arc<dyn Generator>)> {
        match self.provider {
            #[cfg(feature = "gemini")]
            Provider::Gemini => {
                use crate::gemini::{GeminiClient, GeminiEmbedder, GeminiGenerator};

                let mut client = GeminiClient::new(&self.api_key)?;
                if let Some(url) = &self.base_url {
                    client = client.with_base_url(url);
                }
                let mut embedder = GeminiEmbedder::new(client.clone());
                if let Some(model) = &self.embedding_model {
                    embedder = embedder.with_model(model);
                }
                let mut generator = GeminiGenerator::new(client);
                if let Some(model) = &self.generation_model {
                    generator = generator.with_model(model);
                }
                Ok((Arc::new(embedder), Arc::new(generator)))
            }
            #[cfg(feature = "openai")]
            Provider::OpenAi => {
                use crate::openai::{OpenAiClient, OpenAiEmbedder, OpenAiGenerator};

                let mut client = OpenAiClient::new(self.api_key.as_str())?;
                if let Some(url) = &self.base_url {
                    client = client.with_base_url(url.as_str());
                }
                let mut embedder = OpenAiEmbedder::new(client.clone());
                if let Some(model) = &self.embedding_model {
                    embedder = embedder.with_model(model.as_str());
                }
                let mut generator = OpenAiGenerator::new(client);
                if let Some(model) = &self.generation_model {
                    generator = generator.with_model(model.as_str());
                }
                Ok((Arc::new(embedder), Arc::new(generator)))
            }
            #[allow(unreachable_patterns)]
            other => Err(RagError::Config(format!(
                "provider '{other}' is not enabled in this build"
            ))),
        }
    }
}
