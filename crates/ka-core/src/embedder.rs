//! Embedding backend trait and a retrying wrapper

use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::{Error, Result, RetryConfig};

/// Trait for embedding backends
///
/// An embedder turns text into a dense vector of a fixed dimension. Implementations
/// report `BackendUnavailable` for transport faults, `Backend` for non-success
/// responses and `InvalidResponse` when the vector has the wrong dimension.
/// Implementations do not retry.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single piece of text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// The dimension every returned vector has
    fn dimension(&self) -> usize;

    /// Name of the embedding model, for logs and stats
    fn model_name(&self) -> &str;
}

#[async_trait]
impl<E: Embedder + ?Sized> Embedder for Arc<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text).await
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Checks a backend vector against the agreed dimension.
pub fn check_dimension(vector: &[f32], expected: usize) -> Result<()> {
    if vector.len() != expected {
        return Err(Error::InvalidResponse(format!(
            "embedding has dimension {}, expected {}",
            vector.len(),
            expected
        )));
    }
    Ok(())
}

/// Embedder wrapper that bounds every attempt with a timeout and retries
/// transient faults.
///
/// Embedding is idempotent, so the caller may safely repeat a request. Errors
/// that are not transient are returned on the first occurrence.
pub struct RetryingEmbedder<E: Embedder> {
    inner: E,
    config: RetryConfig,
}

impl<E: Embedder> RetryingEmbedder<E> {
    pub fn new(inner: E, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

#[async_trait]
impl<E: Embedder> Embedder for RetryingEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let outcome = match timeout(self.config.attempt_timeout, self.inner.embed(text)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(format!(
                    "embedding attempt {} exceeded {:?}",
                    attempt, self.config.attempt_timeout
                ))),
            };

            match outcome {
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(attempt, error = %e, "embedding attempt failed, retrying");
                    sleep(self.config.backoff * attempt).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FlakyEmbedder {
        calls: AtomicU32,
        failures: u32,
        error: fn() -> Error,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err((self.error)());
            }
            Ok(vec![1.0, 0.0])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    fn fast_retries(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            attempt_timeout: Duration::from_secs(1),
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let embedder = RetryingEmbedder::new(
            FlakyEmbedder {
                calls: AtomicU32::new(0),
                failures: 2,
                error: || Error::BackendUnavailable("connection refused".to_string()),
            },
            fast_retries(3),
        );

        let vector = embedder.embed("hello").await.unwrap();
        assert_eq!(vector, vec![1.0, 0.0]);
        assert_eq!(embedder.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_backend_errors() {
        let embedder = RetryingEmbedder::new(
            FlakyEmbedder {
                calls: AtomicU32::new(0),
                failures: 5,
                error: || Error::Backend("status 500".to_string()),
            },
            fast_retries(3),
        );

        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
        assert_eq!(embedder.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let embedder = RetryingEmbedder::new(
            FlakyEmbedder {
                calls: AtomicU32::new(0),
                failures: 10,
                error: || Error::BackendUnavailable("connection refused".to_string()),
            },
            fast_retries(2),
        );

        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, Error::BackendUnavailable(_)));
        assert_eq!(embedder.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension(&[0.0; 4], 4).is_ok());
        assert!(matches!(
            check_dimension(&[0.0; 3], 4),
            Err(Error::InvalidResponse(_))
        ));
    }
}
