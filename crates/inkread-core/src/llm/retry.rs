//! Retry utilities for quota-limited recognition calls.
//!
//! Only quota/rate-limit failures are retried, with exponential backoff plus
//! jitter. Everything else is returned to the caller on the first attempt.

use crate::config::RetryConfig;
use crate::error::ServiceError;
use crate::types::now_millis;
use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Message fragments that mark a failure as quota exhaustion.
const QUOTA_MARKERS: [&str; 4] = ["429", "quota", "rate limit", "too many requests"];

/// Determine whether a service error is a quota/rate-limit failure.
///
/// Only transport/HTTP errors qualify: a 429 status, or a message that
/// mentions one of the quota markers (case-insensitive).
pub fn is_quota_failure(error: &ServiceError) -> bool {
    match error {
        ServiceError::Http {
            status_code,
            message,
        } => {
            if *status_code == Some(429) {
                return true;
            }
            let message = message.to_lowercase();
            QUOTA_MARKERS.iter().any(|marker| message.contains(marker))
        }
        _ => false,
    }
}

/// Timestamp of the most recent quota failure, shared across the client.
#[derive(Debug, Default)]
pub struct QuotaSignal {
    // Epoch millis, 0 = never
    last_error_ms: AtomicU64,
}

impl QuotaSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a quota failure observed now.
    pub fn record_now(&self) {
        self.last_error_ms.store(now_millis(), Ordering::Relaxed);
    }

    /// When the last quota failure was observed, if ever.
    pub fn last_quota_error(&self) -> Option<SystemTime> {
        match self.last_error_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(UNIX_EPOCH + Duration::from_millis(ms)),
        }
    }
}

/// Exponential backoff policy for quota failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles every attempt
    pub initial_delay: Duration,
    /// Upper bound (exclusive) of the random jitter added to every delay
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(3000),
            max_jitter: Duration::from_millis(2000),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_jitter: Duration::from_millis(config.max_jitter_ms),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retrying after attempt `attempt`, without jitter.
    ///
    /// `initial_delay * 2^attempt`, saturating instead of overflowing.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let initial_ms = self.initial_delay.as_millis() as u64;
        let delay = initial_ms.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay)
    }

    /// Draw a jitter uniformly from `[0, max_jitter)`.
    pub fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }

    /// Run `attempt_fn` until it succeeds, fails non-retriably, or the retry
    /// budget is spent.
    ///
    /// `attempt_fn` receives the zero-based attempt index so callers can vary
    /// the request (e.g. switch model) across attempts. Every quota failure is
    /// recorded on `signal`.
    pub async fn execute<T, F, Fut>(
        &self,
        signal: &QuotaSignal,
        mut attempt_fn: F,
    ) -> Result<T, ServiceError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut attempt = 0;
        loop {
            let error = match attempt_fn(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!("Recognition succeeded on attempt {}", attempt + 1);
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !is_quota_failure(&error) {
                return Err(error);
            }

            signal.record_now();
            if attempt >= self.max_retries {
                tracing::warn!(
                    "Rate limit persists after {} attempts, giving up",
                    attempt + 1
                );
                return Err(error);
            }

            let delay = self.base_delay(attempt).saturating_add(self.jitter());
            tracing::warn!(
                "Rate limit hit. Attempt {}/{}. Waiting {:.1}s...",
                attempt + 1,
                self.max_retries,
                delay.as_secs_f64()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    fn http(message: &str, status_code: Option<u16>) -> ServiceError {
        ServiceError::Http {
            message: message.to_string(),
            status_code,
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_jitter: Duration::ZERO,
        }
    }

    #[test]
    fn test_status_429_is_quota() {
        assert!(is_quota_failure(&http("upstream said no", Some(429))));
    }

    #[test]
    fn test_message_markers_are_quota() {
        assert!(is_quota_failure(&http("HTTP 429 returned", None)));
        assert!(is_quota_failure(&http("RESOURCE_EXHAUSTED: Quota exceeded", Some(400))));
        assert!(is_quota_failure(&http("Rate Limit reached for model", None)));
        assert!(is_quota_failure(&http("Too Many Requests", Some(503))));
    }

    #[test]
    fn test_other_http_errors_not_quota() {
        assert!(!is_quota_failure(&http("HTTP 401: unauthorized", Some(401))));
        assert!(!is_quota_failure(&http("connection refused", None)));
    }

    #[test]
    fn test_non_http_errors_never_quota() {
        let err = ServiceError::Schema {
            model: "m".to_string(),
            message: "quota field missing".to_string(),
        };
        assert!(!is_quota_failure(&err));
        let err = ServiceError::Timeout {
            model: "m".to_string(),
            timeout_ms: 10,
        };
        assert!(!is_quota_failure(&err));
    }

    #[test]
    fn test_backoff_growth() {
        let policy = RetryPolicy::default();
        let expected = [3000, 6000, 12000, 24000, 48000];
        for (attempt, ms) in expected.iter().enumerate() {
            assert_eq!(
                policy.base_delay(attempt as u32),
                Duration::from_millis(*ms)
            );
        }
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay(80), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_jitter_in_range() {
        let policy = RetryPolicy::default();
        for _ in 0..1000 {
            assert!(policy.jitter() < Duration::from_millis(2000));
        }
        assert_eq!(fast_policy(1).jitter(), Duration::ZERO);
    }

    #[test]
    fn test_quota_signal_starts_empty() {
        let signal = QuotaSignal::new();
        assert!(signal.last_quota_error().is_none());
        signal.record_now();
        assert!(signal.last_quota_error().is_some());
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let signal = QuotaSignal::new();
        let calls = AtomicU32::new(0);
        let value = fast_policy(5)
            .execute(&signal, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ServiceError>(7) }
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(signal.last_quota_error().is_none());
    }

    #[tokio::test]
    async fn test_retry_ceiling() {
        let signal = QuotaSignal::new();
        let calls = AtomicU32::new(0);
        let err = fast_policy(5)
            .execute(&signal, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(http("rate limit", Some(429))) }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert!(is_quota_failure(&err));
        assert!(signal.last_quota_error().is_some());
    }

    #[tokio::test]
    async fn test_non_retriable_short_circuit() {
        let signal = QuotaSignal::new();
        let calls = AtomicU32::new(0);
        // A long backoff would show up as a hang if the engine slept
        let policy = RetryPolicy {
            initial_delay: Duration::from_secs(60),
            ..RetryPolicy::default()
        };
        let start = std::time::Instant::now();
        let err = policy
            .execute(&signal, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(http("HTTP 500: internal", Some(500))) }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(err, http("HTTP 500: internal", Some(500)));
        assert!(signal.last_quota_error().is_none());
    }

    #[tokio::test]
    async fn test_recovers_after_quota_failures() {
        let signal = QuotaSignal::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let value = fast_policy(5)
            .execute(&signal, move |attempt| {
                seen_clone.lock().unwrap().push(attempt);
                async move {
                    if attempt < 2 {
                        Err(http("quota exceeded", None))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(value, "done");
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }
}
