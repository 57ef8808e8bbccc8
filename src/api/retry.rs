//! Bounded exponential backoff for transient request failures.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::error::{ApiError, Result};
use crate::config::RetrySettings;

/// Whether repeating a request is safe.
///
/// Every request states this explicitly; only idempotent requests pick up
/// the client's default retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    /// Repeating the request has no additional effect (reads, probes).
    Idempotent,
    /// Repeating the request may duplicate its effect (create, comment, transition).
    NonIdempotent,
}

/// Retry policy parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `3` means at most 4 calls.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling for any single delay.
    pub max_delay: Duration,
    /// HTTP statuses that are worth repeating.
    pub retryable_statuses: Vec<u16>,
    /// Whether to retry when no response was received.
    pub retry_on_network: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    /// Build a policy from configuration.
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            retryable_statuses: settings.retryable_statuses.clone(),
            retry_on_network: settings.retry_on_network,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// `min(base * 2^(retry-1), max)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Check if an error should be retried under this policy.
    pub fn is_retryable(&self, error: &ApiError) -> bool {
        if error.is_network() {
            return self.retry_on_network;
        }
        error
            .status()
            .map(|s| self.retryable_statuses.contains(&s))
            .unwrap_or(false)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent. The last observed error is returned.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if retries < self.max_retries && self.is_retryable(&e) => {
                    retries += 1;
                    let delay = self.delay_for(retries);
                    warn!(
                        "Request failed (retry {}/{}), retrying in {}ms: {}",
                        retries,
                        self.max_retries,
                        delay.as_millis(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if retries > 0 {
                        debug!("Giving up after {} retries", retries);
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            retryable_statuses: vec![429, 500, 502, 503, 504],
            retry_on_network: true,
        }
    }

    fn server_error() -> ApiError {
        ApiError::from_response("GET", "/search", 503, "Service Unavailable", String::new())
    }

    #[test]
    fn test_retry_delay_exponential() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(8000));
    }

    #[test]
    fn test_retry_delay_capped() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(4), Duration::from_millis(5000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(5000));
    }

    #[test]
    fn test_is_retryable_statuses() {
        let policy = fast_policy(3);
        assert!(policy.is_retryable(&server_error()));
        assert!(policy.is_retryable(&ApiError::from_response(
            "GET", "/x", 429, "", String::new()
        )));
        assert!(!policy.is_retryable(&ApiError::from_response(
            "GET", "/x", 401, "", String::new()
        )));
        assert!(!policy.is_retryable(&ApiError::from_response(
            "GET", "/x", 404, "", String::new()
        )));
    }

    #[test]
    fn test_is_retryable_network_flag() {
        let err = ApiError::network("GET", "/x", "refused");
        assert!(fast_policy(1).is_retryable(&err));

        let policy = RetryPolicy {
            retry_on_network: false,
            ..fast_policy(1)
        };
        assert!(!policy.is_retryable(&err));
    }

    #[tokio::test]
    async fn test_run_exhausts_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast_policy(3)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(server_error()) }
            })
            .await;

        assert!(matches!(result, Err(ApiError::Server { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_run_succeeds_on_second_call() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(server_error())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_non_retryable() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast_policy(3)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::from_response("GET", "/x", 404, "", String::new())) }
            })
            .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_none_policy_calls_once() {
        let calls = AtomicU32::new(0);
        let _: Result<()> = RetryPolicy::none()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(server_error()) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
