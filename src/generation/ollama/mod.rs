#[cfg(test)]
mod tests;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::OllamaConfig;
use crate::generation::Generator;
use crate::{RagError, Result};

/// Generation client for Ollama's `/api/generate` endpoint.
///
/// Streaming is disabled; the prompt is answered in one response. Local
/// models can take a while on long prompts, so the request timeout is
/// configured separately from the embedding one.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: Client,
    base_url: Url,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config.ollama_url()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.generate_timeout_secs))
            .build()
            .map_err(|e| {
                RagError::GenerationBackend(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            model: config.generation_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    #[inline]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = self
            .base_url
            .join("/api/generate")
            .map_err(|e| RagError::GenerationBackend(format!("Invalid generate URL: {}", e)))?;

        debug!(
            "Requesting generation from {} ({} prompt bytes)",
            url,
            prompt.len()
        );
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::GenerationBackend(format!("Request to Ollama failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RagError::GenerationBackend(format!(
                "Generation request failed with {}",
                error_detail(response).await
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| {
                RagError::GenerationBackend(format!("Invalid generation response: {}", e))
            })?;

        let answer = match (parsed.response, parsed.text) {
            (Some(response), _) => response,
            (None, Some(text)) => text,
            (None, None) => {
                warn!("Generation response carried no answer text");
                String::new()
            }
        };

        Ok(answer)
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
