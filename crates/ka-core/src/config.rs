//! Retrieval and cache configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// Read `key` from the environment, falling back to `default` when unset.
///
/// A value that is present but does not parse is a configuration error rather
/// than a silent fallback.
pub fn env_or<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| {
            Error::Configuration(format!("{} has invalid value {:?}: {}", key, raw, e))
        }),
        Err(_) => Ok(default),
    }
}

/// Settings for chunking, embedding and retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    pub embedding_dimension: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub embed_concurrency: usize,
    pub index_dir: PathBuf,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: 768,
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 3,
            embed_concurrency: 4,
            index_dir: PathBuf::from("./data"),
        }
    }
}

impl RagConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            embedding_dimension: env_or("EMBEDDING_DIMENSION", defaults.embedding_dimension)?,
            chunk_size: env_or("CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: env_or("CHUNK_OVERLAP", defaults.chunk_overlap)?,
            top_k: env_or("TOP_K_RESULTS", defaults.top_k)?,
            embed_concurrency: env_or("EMBED_CONCURRENCY", defaults.embed_concurrency)?,
            index_dir: env_or("INDEX_DIR", defaults.index_dir)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        validate_chunking(self.chunk_size, self.chunk_overlap)?;
        if self.top_k == 0 {
            return Err(Error::Configuration("TOP_K_RESULTS must be at least 1".to_string()));
        }
        if self.embedding_dimension == 0 {
            return Err(Error::Configuration(
                "EMBEDDING_DIMENSION must be at least 1".to_string(),
            ));
        }
        if self.embed_concurrency == 0 {
            return Err(Error::Configuration(
                "EMBED_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Chunk parameters must satisfy `0 <= overlap < chunk_size`.
pub fn validate_chunking(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::Configuration("chunk size must be at least 1".to_string()));
    }
    if overlap >= chunk_size {
        return Err(Error::Configuration(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}

/// Settings for the response cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Ok(Self {
            enabled: env_or("CACHE_ENABLED", defaults.enabled)?,
            ttl: Duration::from_secs(env_or("CACHE_TTL", defaults.ttl.as_secs())?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RagConfig::default().validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let config = RagConfig {
            chunk_size: 200,
            chunk_overlap: 200,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
        assert!(validate_chunking(200, 199).is_ok());
        assert!(matches!(validate_chunking(0, 0), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let config = RagConfig {
            top_k: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_env_or_parses_and_rejects() {
        // Variable names are unique to this test so parallel tests cannot race on them.
        unsafe {
            env::set_var("KA_TEST_ENV_OR_VALID", " 42 ");
            env::set_var("KA_TEST_ENV_OR_INVALID", "forty-two");
        }

        assert_eq!(env_or("KA_TEST_ENV_OR_VALID", 7usize).unwrap(), 42);
        assert_eq!(env_or("KA_TEST_ENV_OR_UNSET", 7usize).unwrap(), 7);
        assert!(matches!(
            env_or("KA_TEST_ENV_OR_INVALID", 7usize),
            Err(Error::Configuration(_))
        ));
    }
}
