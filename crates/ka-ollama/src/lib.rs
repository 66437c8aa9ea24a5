//! Ollama integration for the knowledge assistant
//!
//! This crate provides one HTTP client that implements both the `Embedder` and
//! the `LLMProvider` traits against a local Ollama server.

mod client;
mod config;


pub use client::OllamaClient;
pub use config::OllamaConfig;

// Re-export core types for convenience
pub use ka_core::{
    Embedder, Error, GenerationConfig, GenerationResult, LLMProvider, Result,
};
