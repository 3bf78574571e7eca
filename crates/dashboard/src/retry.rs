//! Retry with exponential backoff for transient backend failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::api::ApiError;

/// How often and how patiently to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(attempt))
    }
}

/// Run `operation` until it succeeds, fails with a final error, or the policy
/// runs out of retries. The last error is returned.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last retryable one once
/// `max_retries` retries have been spent.
pub async fn retry_with_backoff<T, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if !error.is_retryable() || attempt >= policy.max_retries => {
                return Err(error);
            }
            Err(error) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "retrying backend request"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use storesight_core::ErrorKind;

    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result = retry_with_backoff(policy(), || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ApiError::network("connection reset"))
            } else {
                Ok("ok")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_fails_spends_every_retry() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<(), _> = retry_with_backoff(policy(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::new(ErrorKind::ServiceUnavailable, "bad gateway"))
        })
        .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::ServiceUnavailable);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_errors_are_not_retried() {
        for kind in [
            ErrorKind::AuthRequired,
            ErrorKind::PermissionDenied,
            ErrorKind::AccessLimited,
            ErrorKind::RateLimited,
        ] {
            let calls = AtomicU32::new(0);
            let calls = &calls;
            let result: Result<(), _> = retry_with_backoff(policy(), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::new(kind, "final"))
            })
            .await;

            assert_eq!(result.unwrap_err().kind, kind);
            assert_eq!(calls.load(Ordering::SeqCst), 1, "{kind} was retried");
        }
    }
}
