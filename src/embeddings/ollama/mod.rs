
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::OllamaConfig;
use crate::embeddings::Embedder;
use crate::{RagError, Result};

/// Embedding client for Ollama's `/api/embed` endpoint.
///
/// Requests are sent once and failures surface immediately; the caller
/// decides whether a rebuild or query is worth repeating.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Client,
    base_url: Url,
    model: String,
    batch_size: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config.ollama_url()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.embed_timeout_secs))
            .build()
            .map_err(|e| {
                RagError::EmbeddingBackend(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            model: config.embedding_model.clone(),
            batch_size: config.batch_size as usize,
        })
    }

    /// List the models the Ollama server currently serves.
    ///
    /// Doubles as a reachability check for the status surfaces.
    #[inline]
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = self
            .base_url
            .join("/api/tags")
            .map_err(|e| RagError::EmbeddingBackend(format!("Invalid tags URL: {}", e)))?;

        debug!("Fetching available models from {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RagError::EmbeddingBackend(format!("Request to Ollama failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RagError::EmbeddingBackend(format!(
                "Model listing failed with {}",
                error_detail(response).await
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| RagError::EmbeddingBackend(format!("Invalid tags response: {}", e)))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self
            .base_url
            .join("/api/embed")
            .map_err(|e| RagError::EmbeddingBackend(format!("Invalid embed URL: {}", e)))?;

        debug!("Requesting {} embeddings from {}", texts.len(), url);
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::EmbeddingBackend(format!("Request to Ollama failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RagError::EmbeddingBackend(format!(
                "Embedding request failed with {}",
                error_detail(response).await
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::EmbeddingBackend(format!("Invalid embedding response: {}", e)))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(RagError::EmbeddingBackend(format!(
                "Requested {} embeddings, server returned {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }

        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    #[inline]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        let mut embeddings = self.embed_chunk(&texts).await?;
        embeddings
            .pop()
            .ok_or_else(|| RagError::EmbeddingBackend("Server returned no embedding".to_string()))
    }

    #[inline]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size.max(1)) {
            results.extend(self.embed_chunk(chunk).await?);
        }

        debug!("Embedded {} texts with model {}", results.len(), self.model);
        Ok(results)
    }

    #[inline]
    fn model(&self) -> &str {
        &self.model
    }
}

/// Render a failed response as `<status>` or `<status>: <server error field>`.
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorResponse>().await {
        Ok(body) => format!("{}: {}", status, body.error),
        Err(_) => status.to_string(),
    }
}
