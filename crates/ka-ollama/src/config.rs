//! Ollama configuration

use ka_core::{Result, env_or};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Configuration for the Ollama client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let base_url = env::var("OLLAMA_BASE_URL").unwrap_or(defaults.base_url);
        let model = env::var("OLLAMA_MODEL").unwrap_or(defaults.model);
        let embedding_model =
            env::var("OLLAMA_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            embedding_model,
            temperature: env_or("OLLAMA_TEMPERATURE", defaults.temperature)?,
            max_tokens: env_or("OLLAMA_MAX_TOKENS", defaults.max_tokens)?,
            timeout_secs: env_or("OLLAMA_TIMEOUT_SECS", defaults.timeout_secs)?,
        })
    }

    /// Create configuration pointing at an explicit server
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
