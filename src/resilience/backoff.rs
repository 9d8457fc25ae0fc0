//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

use crate::config::RetryConfig;

/// Retry envelope for a single logical call.
///
/// Immutable once built; the delay for an attempt is a pure function of the
/// attempt index (plus randomness when jitter is on).
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one. Always >= 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub exponential_base: f64,
    /// Scale each delay by a random factor in [0.5, 1.0].
    pub jitter: bool,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is clamped to at least one.
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        exponential_base: f64,
        jitter: bool,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
            exponential_base,
            jitter,
        }
    }

    /// Two attempts, short delays. For calls on a latency-sensitive path.
    pub fn conservative() -> Self {
        Self::new(2, Duration::from_millis(500), Duration::from_secs(5), 2.0, true)
    }

    /// Default envelope for upstream API calls.
    pub fn standard() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(10), 2.0, true)
    }

    /// Many attempts with a gentle curve. For non-critical background work.
    pub fn aggressive() -> Self {
        Self::new(5, Duration::from_millis(500), Duration::from_secs(30), 1.5, true)
    }

    /// Longer delays for flaky networks.
    pub fn network() -> Self {
        Self::new(4, Duration::from_secs(2), Duration::from_secs(60), 2.0, true)
    }

    /// Same envelope with jitter switched off.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay to wait before attempt number `attempt` (0-indexed).
    ///
    /// Attempt 0 is immediate. For later attempts the delay is
    /// `min(initial * base^(attempt-1), max)`, optionally scaled by jitter.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let raw_secs = self.initial_delay.as_secs_f64() * self.exponential_base.powi(exponent);
        let capped_secs = if raw_secs.is_finite() {
            raw_secs.min(self.max_delay.as_secs_f64())
        } else {
            self.max_delay.as_secs_f64()
        };

        let delay_secs = if self.jitter {
            capped_secs * rand::thread_rng().gen_range(0.5..=1.0)
        } else {
            capped_secs
        };

        Duration::from_secs_f64(delay_secs.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.exponential_base,
            config.jitter,
        )
    }
}
