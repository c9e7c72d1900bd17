// Generation module
// Produces grounded answers from rendered prompts via an Ollama server

pub mod ollama;

pub use ollama::OllamaGenerator;

use async_trait::async_trait;

use crate::Result;

/// A backend that completes a fully rendered prompt into an answer.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate an answer for `prompt`.
    ///
    /// One attempt per call. Dropping the returned future abandons the
    /// request; no answer is produced and nothing is retried.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Identifier of the model behind this generator.
    fn model(&self) -> &str;
}
