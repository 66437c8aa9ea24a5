//! Core traits and types for the knowledge assistant
//!
//! This crate defines the fundamental traits and types shared by the retrieval
//! pipeline, the chat orchestrator and the backend clients: embedders, LLM
//! providers and cache stores, plus the error taxonomy and configuration.

pub mod cache;
pub mod config;
pub mod embedder;
pub mod error;
pub mod llm;
pub mod text;
pub mod types;


pub use cache::CacheStore;
pub use config::{CacheConfig, RagConfig, env_or, validate_chunking};
pub use embedder::{Embedder, RetryingEmbedder, check_dimension};
pub use error::{Error, Result};
pub use llm::{GenerationConfig, GenerationResult, LLMProvider};
pub use text::preview;
pub use types::*;
