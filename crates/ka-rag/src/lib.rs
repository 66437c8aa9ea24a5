//! Retrieval for the knowledge assistant
//!
//! Documents are split into overlapping chunks, embedded, and appended to an
//! exhaustive L2 index whose rows line up with a chunk store. Both are persisted
//! together under the configured index directory.

pub mod chunker;
pub mod index;
pub mod persistence;
mod service;

#[cfg(test)]
mod tests;

pub use index::{ChunkStore, FlatL2Index};
pub use service::{CONTEXT_SEPARATOR, IndexCounts, RetrievalService, build_context, similarity};

// Re-export core types for convenience
pub use ka_core::{Chunk, Embedder, Error, RagConfig, Result, SourceReference};
