//! Used-refresh-token tracking.
//!
//! With refresh token rotation each refresh token may be redeemed once. Its
//! `jti` is recorded here, together with the token's expiry so the entry can
//! be purged once the token would be rejected anyway.
//!
//! # Failure semantics
//!
//! [`RetryingRevocationStore`] bounds every call with a timeout and retries
//! with exponential backoff. When attempts run out the call fails with
//! [`AuthError::TransientStore`]; it never reports a token as unused.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::config::RevocationConfig;
use crate::error::{AuthError, AuthResult};

/// Storage for used token identifiers.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Atomically marks a JTI as used if not already used.
    ///
    /// Returns `true` on first use and `false` if the JTI was already
    /// recorded. Two concurrent calls with the same JTI never both see
    /// `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn mark_used(&self, jti: &str, expires_at: i64) -> AuthResult<bool>;

    /// Checks whether a JTI has been used.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn is_used(&self, jti: &str) -> AuthResult<bool>;

    /// Removes entries whose expiry is at or before `now` (Unix seconds).
    ///
    /// Returns the number of removed entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn cleanup_expired(&self, now: i64) -> AuthResult<u64>;
}

/// Wraps a store with per-call timeouts and bounded retries.
pub struct RetryingRevocationStore {
    inner: Arc<dyn RevocationStore>,
    config: RevocationConfig,
}

impl RetryingRevocationStore {
    /// Creates a retrying wrapper around `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn RevocationStore>, config: RevocationConfig) -> Self {
        Self { inner, config }
    }

    async fn with_retry<T, F, Fut>(&self, operation: &'static str, call: F) -> AuthResult<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = AuthResult<T>> + Send,
        T: Send,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let failure = match tokio::time::timeout(self.config.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if e.is_retryable() => e.to_string(),
                Ok(Err(e)) => return Err(e),
                Err(_) => format!("timed out after {:?}", self.config.timeout),
            };

            if attempt >= max_attempts {
                warn!(
                    operation,
                    attempts = attempt,
                    error = %failure,
                    "Revocation store unavailable"
                );
                return Err(AuthError::transient_store(format!(
                    "{operation} failed after {attempt} attempts: {failure}"
                )));
            }

            let backoff = self.config.initial_backoff * 2_u32.pow(attempt - 1);
            warn!(
                operation,
                attempt,
                max_attempts,
                backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                error = %failure,
                "Revocation store call failed, retrying"
            );
            tokio::time::sleep(backoff).await;
        }
    }
}

#[async_trait]
impl RevocationStore for RetryingRevocationStore {
    async fn mark_used(&self, jti: &str, expires_at: i64) -> AuthResult<bool> {
        self.with_retry("mark_used", || self.inner.mark_used(jti, expires_at))
            .await
    }

    async fn is_used(&self, jti: &str) -> AuthResult<bool> {
        self.with_retry("is_used", || self.inner.is_used(jti)).await
    }

    async fn cleanup_expired(&self, now: i64) -> AuthResult<u64> {
        self.with_retry("cleanup_expired", || self.inner.cleanup_expired(now))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use crate::storage::InMemoryRevocationStore;

    /// Fails the first `failures` calls, then delegates.
    struct FlakyStore {
        failures: u32,
        calls: AtomicU32,
        inner: InMemoryRevocationStore,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                inner: InMemoryRevocationStore::new(),
            }
        }

        fn fail(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst) < self.failures
        }
    }

    #[async_trait]
    impl RevocationStore for FlakyStore {
        async fn mark_used(&self, jti: &str, expires_at: i64) -> AuthResult<bool> {
            if self.fail() {
                return Err(AuthError::transient_store("connection reset"));
            }
            self.inner.mark_used(jti, expires_at).await
        }

        async fn is_used(&self, jti: &str) -> AuthResult<bool> {
            if self.fail() {
                // Never answers; the wrapper's timeout fires.
                std::future::pending::<()>().await;
            }
            self.inner.is_used(jti).await
        }

        async fn cleanup_expired(&self, _now: i64) -> AuthResult<u64> {
            Err(AuthError::internal("not supported"))
        }
    }

    fn config() -> RevocationConfig {
        RevocationConfig {
            timeout: Duration::from_millis(20),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            ..RevocationConfig::default()
        }
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let flaky = Arc::new(FlakyStore::new(2));
        let store = RetryingRevocationStore::new(flaky.clone(), config());

        assert!(store.mark_used("jti-1", 100).await.unwrap());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_transient_error() {
        let flaky = Arc::new(FlakyStore::new(10));
        let store = RetryingRevocationStore::new(flaky.clone(), config());

        let err = store.mark_used("jti-1", 100).await.unwrap_err();
        assert!(matches!(err, AuthError::TransientStore { .. }));
        assert!(err.is_retryable());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        let flaky = Arc::new(FlakyStore::new(1));
        let store = RetryingRevocationStore::new(flaky.clone(), config());

        assert!(!store.is_used("jti-1").await.unwrap());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let flaky = Arc::new(FlakyStore::new(0));
        let store = RetryingRevocationStore::new(flaky, config());

        let err = store.cleanup_expired(0).await.unwrap_err();
        assert!(matches!(err, AuthError::Internal { .. }));
    }
}
