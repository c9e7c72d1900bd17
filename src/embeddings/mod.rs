// Embeddings module
// Turns email text into fixed-dimension vectors via an Ollama server

pub mod ollama;

pub use ollama::OllamaEmbedder;

use async_trait::async_trait;

use crate::Result;

/// A backend that maps text to fixed-dimension vectors.
///
/// All vectors produced by one embedder share a dimension; indexes record the
/// model name so a query embedded with a different model is refused instead
/// of silently compared against foreign vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier of the model behind this embedder.
    fn model(&self) -> &str;
}
