//! Grounded answer synthesis.
//!
//! Retrieved chunks are joined into a single context block and substituted
//! into a fixed instruction template. The template restricts the model to
//! the supplied context and names the exact phrase to return when the
//! context holds no answer.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::DEFAULT_TEMPERATURE;
use crate::deadline::with_deadline;
use crate::document::SearchResult;
use crate::error::{RagError, Result};
use crate::generation::Generator;

/// Phrase the model must return when the context does not contain the answer.
pub const UNAVAILABLE_ANSWER: &str = "answer is not available in the context";

const INSTRUCTIONS: &str = "Answer the question as detailed as possible from the provided \
context, making sure to provide all the details. Use only the provided context. If the answer \
is not in the provided context, just say, \"answer is not available in the context\". Do not \
provide a wrong answer or any information that is not in the context.";

/// The outcome of a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// Raw model output.
    pub text: String,
    /// The chunks the answer was grounded on, in ranking order.
    pub sources: Vec<SearchResult>,
}

impl Answer {
    /// Whether the model reported that the context holds no answer.
    ///
    /// Surrounding quotes, letter case and trailing punctuation are ignored.
    pub fn is_unavailable(&self) -> bool {
        let normalized = self
            .text
            .trim()
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '.' | '!') || c.is_whitespace())
            .to_lowercase();
        normalized == UNAVAILABLE_ANSWER
    }
}

/// Join chunk texts in ranking order, separated by a blank line.
pub fn build_context(results: &[SearchResult]) -> String {
    results.iter().map(|r| r.chunk.text.as_str()).collect::<Vec<_>>().join("\n\n")
}

/// Fill the instruction template with `context` and `question`.
///
/// Both values are inserted verbatim in one pass, so placeholder-like text
/// inside the context is never re-interpreted.
pub fn render_prompt(context: &str, question: &str) -> String {
    format!("{INSTRUCTIONS}\n\nContext:\n{context}\n\nQuestion:\n{question}\n\nAnswer:\n")
}

/// Turns retrieved chunks into an answer through a [`Generator`].
pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
    temperature: f32,
    timeout: Duration,
}

impl AnswerSynthesizer {
    /// Create a synthesizer with temperature 0.3 and a 60 second timeout.
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator, temperature: DEFAULT_TEMPERATURE, timeout: Duration::from_secs(60) }
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the time limit for the generation call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Generate an answer to `question` from `results`.
    ///
    /// The generator is called exactly once; failures are not retried.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationService`] if the call fails, times out,
    /// or yields only whitespace.
    pub async fn synthesize(&self, question: &str, results: Vec<SearchResult>) -> Result<Answer> {
        let context = build_context(&results);
        let prompt = render_prompt(&context, question);
        let model = self.generator.model_id();
        debug!(
            model,
            source_count = results.len(),
            context_chars = context.chars().count(),
            "generating answer"
        );

        let text = with_deadline(
            self.timeout,
            self.generator.generate(&prompt, self.temperature),
            |message| RagError::generation(model, message),
        )
        .await?;

        if text.trim().is_empty() {
            return Err(RagError::generation(model, "model returned no content"));
        }

        let answer = Answer { text, sources: results };
        info!(model, unavailable = answer.is_unavailable(), "answer generated");
        Ok(answer)
    }
}
