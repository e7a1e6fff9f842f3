//! Generative service trait for producing answers from a filled prompt.

use async_trait::async_trait;

use crate::error::Result;

/// A text-generation backend.
///
/// Implementations send the prompt as a single user turn and return the raw
/// completion text. An empty completion must be reported as
/// [`RagError::GenerationService`](crate::RagError::GenerationService)
/// rather than returned as `Ok("")`.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Identifier of the generation model, used in logs.
    fn model_id(&self) -> &str;

    /// Complete `prompt` at the given sampling temperature.
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String>;
}
