//! Exponential backoff for calls that race remote propagation.
//!
//! Right after an object is created the directory may still answer
//! `NotFound` for calls addressing it (the admin role call in particular).
//! Those, and transient failures, are retried here.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::RemoteError;
use crate::store::RemoteResult;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one (values below 1 act as 1).
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay_ms)
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            ..Self::default()
        }
    }

    /// A policy that tries once.
    #[must_use]
    pub fn none() -> Self {
        Self::new(1, 0)
    }

    /// Whether the error should be retried after `attempt` (zero-based).
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &RemoteError) -> bool {
        if attempt + 1 >= self.max_attempts {
            return false;
        }
        error.is_not_found() || error.is_transient()
    }

    /// `min(base_delay_ms * 2^attempt, max_delay_ms)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(exponential.min(self.max_delay_ms))
    }

    /// Run `f` until it succeeds, fails permanently, or attempts run out.
    /// The last error is returned when attempts run out.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut f: F) -> RemoteResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !self.should_retry(attempt, &error) {
                        if error.is_not_found() || error.is_transient() {
                            warn!(
                                operation = operation_name,
                                attempts = attempt + 1,
                                error = %error,
                                "Max attempts exceeded"
                            );
                        }
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt);
                    debug!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying after not-found or transient error"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay_ms, 1000);
    }

    #[test]
    fn test_should_retry_not_found_and_transient() {
        let policy = RetryPolicy::new(3, 10);
        assert!(policy.should_retry(0, &RemoteError::not_found("user")));
        assert!(policy.should_retry(1, &RemoteError::RateLimited));
        assert!(!policy.should_retry(2, &RemoteError::RateLimited)); // last attempt
    }

    #[test]
    fn test_should_not_retry_permanent_error() {
        let policy = RetryPolicy::new(3, 10);
        assert!(!policy.should_retry(0, &RemoteError::invalid_input("bad")));
        assert!(!policy.should_retry(0, &RemoteError::failed("boom")));
    }

    #[test]
    fn test_delay_exponential_and_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 100,
            max_delay_ms: 1000,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_execute_rides_out_not_found() {
        let policy = RetryPolicy::new(5, 0);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = policy
            .execute("set_admin", move || {
                let counter = counter_clone.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(RemoteError::not_found("user"))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_returns_last_error_when_exhausted() {
        let policy = RetryPolicy::new(2, 0);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: RemoteResult<()> = policy
            .execute("set_admin", move || {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(RemoteError::not_found("user"))
                }
            })
            .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_execute_permanent_error_fails_immediately() {
        let policy = RetryPolicy::new(5, 0);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: RemoteResult<()> = policy
            .execute("set_admin", move || {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(RemoteError::failed("denied"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_none_policy_never_retries() {
        let policy = RetryPolicy::none();
        assert!(!policy.should_retry(0, &RemoteError::not_found("user")));
    }
}
