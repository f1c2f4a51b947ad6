use crate::error::BackendError;
use crate::observe::{Event, ObservabilitySink};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Shared, stateless retry configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema)]
pub struct RetryPolicy {
    #[serde(default = "crate::config::defaults::default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "crate::config::defaults::default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "crate::config::defaults::default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::config::defaults::default_max_attempts(),
            base_delay_ms: crate::config::defaults::default_base_delay_ms(),
            max_delay_ms: crate::config::defaults::default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `n` (1-based): `min(base * 2^(n-1), max)`.
    /// Deterministic so tests and capacity planning can reason about it.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let millis = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }
}

/// Execute an async backend operation with exponential backoff.
///
/// Only transient errors are retried; a non-retryable error fails on the
/// spot without consuming further attempts. Every retry is reported to the
/// observability sink.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    sink: &dyn ObservabilitySink,
    op: &'static str,
    mut operation: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_transient() => {
                warn!(op, attempt, %e, "non-retryable failure");
                return Err(e);
            }
            Err(e) if attempt >= policy.max_attempts => {
                warn!(op, attempt, %e, "all attempts exhausted");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_before(attempt);
                sink.record(Event::Retry {
                    op,
                    attempt,
                    delay,
                    error: e.to_string(),
                });
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::test_support::RecordingSink;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 250,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = policy();
        assert_eq!(p.delay_before(1), Duration::from_millis(100));
        assert_eq!(p.delay_before(2), Duration::from_millis(200));
        assert_eq!(p.delay_before(3), Duration::from_millis(250));
        assert_eq!(p.delay_before(10), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn success_first_attempt_makes_one_call() {
        let sink = RecordingSink::default();
        let result = with_retry(&policy(), &sink, "op", || async { Ok::<_, BackendError>(42) })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(sink.retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_exhaust_max_attempts() {
        let sink = RecordingSink::default();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<u32, _> = with_retry(&policy(), &sink, "op", || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(BackendError::Unavailable("down".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(BackendError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sink.retries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_short_circuits() {
        let sink = RecordingSink::default();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<u32, _> = with_retry(&policy(), &sink, "op", || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(BackendError::InvalidInput("bad prompt".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(BackendError::InvalidInput(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let sink = RecordingSink::default();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = with_retry(&policy(), &sink, "op", || {
            let calls = calls_clone.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(BackendError::Timeout(Duration::from_secs(1)))
                } else {
                    Ok(7)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sink.retries(), 2);
    }
}
