//! Common types used across the knowledge assistant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A bounded slice of a document's text, the unit of embedding and retrieval.
///
/// Chunks are never mutated once created; the chunk store only appends them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: String,
    pub filename: String,
    pub chunk_index: usize,
    pub content: String,
}

/// A document handed to the indexer after extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub content: String,
}

/// A document cited in an answer, with the similarity of its best chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReference {
    pub document_id: String,
    pub filename: String,
    pub relevance_score: f32,
}

/// A cached answer for one normalized query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub answer: String,
    pub sources: Vec<SourceReference>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// What a chat query produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<SourceReference>,
    pub cache_hit: bool,
}

/// Configuration for retry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(30),
            backoff: Duration::from_millis(250),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cache_entry_expiry_boundary() {
        let expires_at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let entry = CacheEntry {
            key: "chat:abc".to_string(),
            answer: "42".to_string(),
            sources: vec![],
            expires_at,
        };

        assert!(!entry.is_expired_at(expires_at - chrono::Duration::seconds(1)));
        assert!(entry.is_expired_at(expires_at));
    }
}
