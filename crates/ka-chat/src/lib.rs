//! Chat layer for the knowledge assistant
//!
//! Turns a user query into an answer grounded in the indexed corpus, with a
//! TTL-bounded response cache in front of retrieval and generation.

mod cache;
mod orchestrator;
pub mod prompt;


pub use cache::{InMemoryCacheStore, ResponseCache, normalize_query};
pub use orchestrator::ChatOrchestrator;

// Re-export core types
pub use ka_core::{CacheConfig, Error, QueryAnswer, Result, SourceReference};
