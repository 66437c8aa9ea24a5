//! Query-to-answer response cache

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use ka_core::{CacheConfig, CacheEntry, CacheStore, Result, SourceReference, preview};

/// Trim the query and collapse internal whitespace runs to a single space.
///
/// Case is preserved, so "Leave policy" and "leave policy" are cached apart.
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// TTL-bounded cache of generated answers, keyed by normalized query.
///
/// Backend failures never reach the caller: a failed read is a miss and a
/// failed write is skipped, both logged at warn level.
pub struct ResponseCache<S: CacheStore> {
    store: S,
    config: CacheConfig,
}

impl<S: CacheStore> ResponseCache<S> {
    pub fn new(store: S, config: CacheConfig) -> Self {
        Self { store, config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// TTL applied to new entries
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Cache key for `query`: `chat:` followed by the MD5 hex of the normalized query.
    pub fn key_for(query: &str) -> String {
        format!("chat:{:x}", md5::compute(normalize_query(query).as_bytes()))
    }

    /// Cached entry for `query`, if one exists and has not expired.
    pub async fn get(&self, query: &str) -> Option<CacheEntry> {
        self.get_at(query, Utc::now()).await
    }

    pub async fn get_at(&self, query: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        if !self.config.enabled {
            return None;
        }

        let key = Self::key_for(query);
        let entry = match self.store.get(&key).await {
            Ok(entry) => entry?,
            Err(e) => {
                warn!(error = %e, key = %key, "cache read failed, treating as miss");
                return None;
            }
        };

        if entry.is_expired_at(now) {
            debug!(key = %key, "cache entry expired");
            if let Err(e) = self.store.remove(&key).await {
                warn!(error = %e, key = %key, "failed to drop expired cache entry");
            }
            return None;
        }

        debug!(key = %key, query = %preview(query, 50), "cache hit");
        Some(entry)
    }

    /// Store an answer for `query`, replacing any previous entry.
    pub async fn put(&self, query: &str, answer: &str, sources: &[SourceReference], ttl: Duration) {
        self.put_at(query, answer, sources, ttl, Utc::now()).await
    }

    pub async fn put_at(
        &self,
        query: &str,
        answer: &str,
        sources: &[SourceReference],
        ttl: Duration,
        now: DateTime<Utc>,
    ) {
        if !self.config.enabled {
            return;
        }

        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let entry = CacheEntry {
            key: Self::key_for(query),
            answer: answer.to_string(),
            sources: sources.to_vec(),
            expires_at,
        };
        let key = entry.key.clone();

        match self.store.put(entry).await {
            Ok(()) => debug!(key = %key, ttl_secs = ttl.as_secs(), "cached response"),
            Err(e) => warn!(error = %e, key = %key, "cache write failed, skipping"),
        }
    }
}

/// In-process cache backend
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        self.entries.write().await.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ka_core::Error;

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<CacheEntry>> {
            Err(Error::Cache("connection reset".to_string()))
        }

        async fn put(&self, _entry: CacheEntry) -> Result<()> {
            Err(Error::Cache("connection reset".to_string()))
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Err(Error::Cache("connection reset".to_string()))
        }
    }

    fn sources() -> Vec<SourceReference> {
        vec![SourceReference {
            document_id: "3".to_string(),
            filename: "benefits.txt".to_string(),
            relevance_score: 0.5,
        }]
    }

    fn cache() -> ResponseCache<InMemoryCacheStore> {
        ResponseCache::new(InMemoryCacheStore::new(), CacheConfig::default())
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_query("  How many\t days \n off?  "), "How many days off?");
        assert_eq!(normalize_query("Case Stays"), "Case Stays");
        assert_eq!(normalize_query("   "), "");
    }

    #[test]
    fn test_key_is_deterministic_over_normalization() {
        let key = ResponseCache::<InMemoryCacheStore>::key_for("what is the leave policy");
        assert_eq!(
            key,
            ResponseCache::<InMemoryCacheStore>::key_for("  what  is the\nleave policy ")
        );
        assert_ne!(
            key,
            ResponseCache::<InMemoryCacheStore>::key_for("What is the leave policy")
        );
        assert!(key.starts_with("chat:"));
        assert_eq!(key.len(), "chat:".len() + 32);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = cache();
        assert!(cache.get("leave?").await.is_none());

        cache.put("leave?", "Two days a month.", &sources(), cache.ttl()).await;
        let entry = cache.get(" leave? ").await.unwrap();

        assert_eq!(entry.answer, "Two days a month.");
        assert_eq!(entry.sources, sources());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = cache();
        cache.put("q", "first", &[], cache.ttl()).await;
        cache.put("q", "second", &sources(), cache.ttl()).await;

        assert_eq!(cache.get("q").await.unwrap().answer, "second");
        assert_eq!(cache.store().len().await, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss_and_dropped() {
        let cache = cache();
        let now = Utc::now();
        cache
            .put_at("q", "answer", &[], Duration::from_secs(60), now)
            .await;

        assert!(cache.get_at("q", now + chrono::Duration::seconds(59)).await.is_some());
        assert!(cache.get_at("q", now + chrono::Duration::seconds(60)).await.is_none());
        assert!(cache.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_zero_ttl_never_hits() {
        let cache = cache();
        let now = Utc::now();
        cache.put_at("q", "answer", &[], Duration::ZERO, now).await;

        assert!(cache.get_at("q", now).await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_cache_is_inert() {
        let cache = ResponseCache::new(
            InMemoryCacheStore::new(),
            CacheConfig {
                enabled: false,
                ..CacheConfig::default()
            },
        );
        cache.put("q", "answer", &[], cache.ttl()).await;

        assert!(cache.get("q").await.is_none());
        assert!(cache.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed() {
        let cache = ResponseCache::new(BrokenStore, CacheConfig::default());

        cache.put("q", "answer", &sources(), cache.ttl()).await;
        assert!(cache.get("q").await.is_none());
    }
}
