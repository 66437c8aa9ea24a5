//! Ollama client implementation

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::debug;

use ka_core::{
    Embedder, Error, GenerationConfig, GenerationResult, LLMProvider, Result, check_dimension,
};

use crate::config::OllamaConfig;

/// Ollama client for embeddings and text generation
pub struct OllamaClient {
    config: OllamaConfig,
    client: Client,
    dimension: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmbeddingRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub num_predict: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
    pub options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl OllamaClient {
    /// Dimension of `nomic-embed-text`, the default embedding model
    pub const DEFAULT_DIMENSION: usize = 768;

    /// Create a new Ollama client from configuration
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            dimension: Self::DEFAULT_DIMENSION,
        })
    }

    /// Create a new Ollama client from environment variables
    pub fn from_env() -> Result<Self> {
        let config = OllamaConfig::from_env()?;
        Self::new(config)
    }

    /// Set the embedding dimension the index was created with
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Generation settings derived from the client configuration
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            model_id: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature),
            timeout: self.config.timeout(),
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        let url = format!("{}{}", self.config.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("request to {} timed out", url))
                } else {
                    Error::BackendUnavailable(format!("request to {} failed: {}", url, e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Backend(format!(
                "Ollama request to {} failed with status {}: {}",
                path, status, error_text
            )));
        }

        Ok(response)
    }

    /// Perform the actual generation request
    async fn perform_generation(&self, prompt: &str, config: &GenerationConfig) -> Result<GenerationResult> {
        let request_body = GenerateRequest {
            model: &config.model_id,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: config.temperature,
                num_predict: config.max_tokens,
            },
        };

        let response = self.post("/api/generate", &request_body).await?;
        let data: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(format!("undecodable generate response: {}", e)))?;

        let text = data.response.trim().to_string();
        if text.is_empty() {
            return Err(Error::InvalidResponse(
                "Empty response from Ollama generate API".to_string(),
            ));
        }

        Ok(GenerationResult {
            text,
            model_id: config.model_id.clone(),
            tokens_used: data.eval_count,
        })
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request_body = EmbeddingRequest {
            model: &self.config.embedding_model,
            prompt: text,
        };

        let response = self.post("/api/embeddings", &request_body).await?;
        let data: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(format!("undecodable embedding response: {}", e)))?;

        check_dimension(&data.embedding, self.dimension)?;
        debug!(chars = text.len(), "embedded text");
        Ok(data.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.embedding_model
    }
}

#[async_trait]
impl LLMProvider for OllamaClient {
    async fn generate_with_config(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        let generation_future = self.perform_generation(prompt, config);

        match timeout(config.timeout, generation_future).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout("Request timed out".to_string())),
        }
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}
