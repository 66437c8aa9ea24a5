//! Cache store trait

use async_trait::async_trait;

use crate::{CacheEntry, Result};

/// Key-value backend behind the response cache (an in-process map, Redis, ...).
///
/// Stores may fail freely; the response cache above them turns every failure
/// into a miss or a no-op. Expiry is checked by the caller on read, so a store
/// may return an entry past its `expires_at`.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch the entry stored under `key`
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Store `entry` under its key, replacing whatever was there
    async fn put(&self, entry: CacheEntry) -> Result<()>;

    /// Drop the entry stored under `key`, if any
    async fn remove(&self, key: &str) -> Result<()>;
}
