//! Retry logic.
//!
//! # Responsibilities
//! - Classify failures as retryable or not
//! - Execute an operation with exponential backoff + jitter
//! - Count attempt outcomes for observability
//!
//! Unknown failures are never retried.

use std::collections::BTreeMap;
use std::future::Future;

use parking_lot::Mutex;
use serde::Serialize;

use crate::observability::metrics;
use crate::resilience::backoff::RetryPolicy;
use crate::resilience::error::{ApiError, ApiResult};

/// HTTP statuses that indicate a transient upstream condition.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Whether an HTTP status code is worth retrying.
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Whether an error is worth retrying.
pub fn is_retryable(err: &ApiError) -> bool {
    match err {
        ApiError::Timeout(_) | ApiError::Connect(_) | ApiError::Retryable(_) => true,
        ApiError::Status { status, .. } => is_retryable_status(*status),
        ApiError::NonRetryable(_)
        | ApiError::CircuitOpen { .. }
        | ApiError::Transport(_)
        | ApiError::Decode(_)
        | ApiError::Config(_) => false,
    }
}

/// Snapshot of retry statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetryStats {
    pub total_attempts: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub success_rate: f64,
    /// Attempt number (1-indexed) -> how many times it was reached.
    pub retry_distribution: BTreeMap<u32, u64>,
    /// Error kind -> failure count.
    pub failure_types: BTreeMap<String, u64>,
}

#[derive(Debug, Default)]
struct RetryCounters {
    total_attempts: u64,
    total_successes: u64,
    total_failures: u64,
    retry_distribution: BTreeMap<u32, u64>,
    failure_types: BTreeMap<String, u64>,
}

/// In-process attempt counters, shared by every caller of one pipeline.
#[derive(Debug, Default)]
pub struct RetryMetrics {
    counters: Mutex<RetryCounters>,
}

impl RetryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one attempt. `attempt_number` is 1-indexed.
    pub fn record_attempt(&self, attempt_number: u32, outcome: Result<(), &ApiError>) {
        let mut counters = self.counters.lock();
        counters.total_attempts += 1;
        match outcome {
            Ok(()) => counters.total_successes += 1,
            Err(err) => {
                counters.total_failures += 1;
                *counters.failure_types.entry(err.kind().to_string()).or_insert(0) += 1;
            }
        }
        *counters.retry_distribution.entry(attempt_number).or_insert(0) += 1;
        drop(counters);

        metrics::record_retry_attempt(outcome.is_ok());
    }

    pub fn stats(&self) -> RetryStats {
        let counters = self.counters.lock();
        let success_rate = counters.total_successes as f64 / counters.total_attempts.max(1) as f64;
        RetryStats {
            total_attempts: counters.total_attempts,
            total_successes: counters.total_successes,
            total_failures: counters.total_failures,
            success_rate: (success_rate * 1000.0).round() / 1000.0,
            retry_distribution: counters.retry_distribution.clone(),
            failure_types: counters.failure_types.clone(),
        }
    }
}

/// Run `operation` under `policy`.
///
/// Sleeps `policy.calculate_delay(attempt)` before every attempt after the
/// first. Stops at the first non-retryable error and returns it; after
/// `max_attempts` failures returns the last error.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    retry_metrics: &RetryMetrics,
    mut operation: F,
) -> ApiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = policy.calculate_delay(attempt);
            tracing::debug!(
                attempt = attempt + 1,
                max_attempts,
                delay = ?delay,
                "Retrying after backoff"
            );
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(value) => {
                retry_metrics.record_attempt(attempt + 1, Ok(()));
                if attempt > 0 {
                    tracing::info!(attempt = attempt + 1, max_attempts, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                retry_metrics.record_attempt(attempt + 1, Err(&err));

                if !is_retryable(&err) {
                    tracing::debug!(kind = err.kind(), error = %err, "Non-retryable error");
                    return Err(err);
                }

                if attempt + 1 >= max_attempts {
                    tracing::warn!(max_attempts, error = %err, "All attempts failed");
                    return Err(err);
                }

                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts,
                    kind = err.kind(),
                    error = %err,
                    "Attempt failed"
                );
            }
        }

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(5), 2.0, false)
    }

    #[test]
    fn test_status_classification() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(is_retryable_status(status), "{} should be retryable", status);
        }
        for status in [200, 400, 401, 404] {
            assert!(!is_retryable_status(status), "{} should not be retryable", status);
        }
    }

    #[test]
    fn test_error_classification() {
        assert!(is_retryable(&ApiError::Timeout("slow".into())));
        assert!(is_retryable(&ApiError::Connect("reset".into())));
        assert!(is_retryable(&ApiError::Retryable("marker".into())));
        assert!(is_retryable(&ApiError::Status { status: 503, message: String::new() }));

        assert!(!is_retryable(&ApiError::NonRetryable("marker".into())));
        assert!(!is_retryable(&ApiError::Status { status: 403, message: String::new() }));
        assert!(!is_retryable(&ApiError::Transport("unknown".into())));
        assert!(!is_retryable(&ApiError::CircuitOpen { last_failure_secs_ago: 0.0 }));
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let retry_metrics = RetryMetrics::new();

        let result = run_with_retry(&fast_policy(3), &retry_metrics, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ApiError::Connect("refused".into()))
                } else {
                    Ok("success")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let stats = retry_metrics.stats();
        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.total_successes, 1);
        assert_eq!(stats.total_failures, 2);
        assert_eq!(stats.failure_types.get("connect"), Some(&2));
    }

    #[tokio::test]
    async fn test_non_retryable_runs_once() {
        let calls = AtomicU32::new(0);
        let retry_metrics = RetryMetrics::new();

        let result: ApiResult<()> = run_with_retry(&fast_policy(5), &retry_metrics, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::NonRetryable("bad input".into())) }
        })
        .await;

        assert!(matches!(result, Err(ApiError::NonRetryable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let retry_metrics = RetryMetrics::new();

        let result: ApiResult<()> = run_with_retry(&fast_policy(3), &retry_metrics, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(ApiError::Timeout(format!("attempt {}", n))) }
        })
        .await;

        match result {
            Err(ApiError::Timeout(msg)) => assert_eq!(msg, "attempt 2"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_between_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(10), 2.0, false);
        let retry_metrics = RetryMetrics::new();
        let start = tokio::time::Instant::now();

        let _: ApiResult<()> = run_with_retry(&policy, &retry_metrics, || async {
            Err(ApiError::Status { status: 503, message: "unavailable".into() })
        })
        .await;

        // 1s before the second attempt, 2s before the third.
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn test_stats_success_rate() {
        let retry_metrics = RetryMetrics::new();
        retry_metrics.record_attempt(1, Ok(()));
        retry_metrics.record_attempt(1, Err(&ApiError::Timeout("t".into())));
        retry_metrics.record_attempt(2, Ok(()));

        let stats = retry_metrics.stats();
        assert_eq!(stats.success_rate, 0.667);
        assert_eq!(stats.retry_distribution.get(&1), Some(&2));
        assert_eq!(stats.retry_distribution.get(&2), Some(&1));
    }
}
