//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast
//! - Half-Open: testing if upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold
//! Open → Half-Open: first call after recovery timeout
//! Half-Open → Closed: probe request succeeds
//! Half-Open → Open: probe request fails
//! ```
//!
//! # Design Decisions
//! - One breaker per upstream dependency
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering recovering upstream)
//! - State is only touched under the lock, never across an await

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::error::{ApiError, ApiResult};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a breaker, safe to hand out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    /// Unix timestamp (seconds) of the last counted failure.
    pub last_failure_time: Option<f64>,
    pub failure_threshold: u32,
    pub recovery_timeout_secs: f64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    last_failure_unix: Option<f64>,
    probe_in_flight: bool,
}

/// Guards calls to one upstream dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a breaker. `failure_threshold` is clamped to at least one.
    pub fn new(name: impl Into<String>, failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                last_failure_unix: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self::new(
            name,
            config.failure_threshold,
            Duration::from_secs_f64(config.recovery_timeout_secs),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state without side effects.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Execute `f` under breaker protection.
    ///
    /// Rejects with [`ApiError::CircuitOpen`] without invoking `f` when the
    /// circuit is open and the recovery timeout has not elapsed, or when a
    /// half-open probe is already in flight.
    pub async fn call<T, F, Fut>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let permit = self.acquire()?;
        let result = f().await;

        match &result {
            Ok(_) => permit.succeed(),
            Err(err) if err.is_breaker_failure() => permit.fail(),
            Err(err) => {
                tracing::debug!(
                    breaker = %self.name,
                    kind = err.kind(),
                    "Error not counted by circuit breaker"
                );
                permit.release();
            }
        }

        result
    }

    /// Immutable snapshot for observability.
    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.inner.lock();
        CircuitBreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure_time: inner.last_failure_unix,
            failure_threshold: self.failure_threshold,
            recovery_timeout_secs: self.recovery_timeout.as_secs_f64(),
        }
    }

    fn acquire(&self) -> ApiResult<Permit<'_>> {
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => Ok(Permit::new(self, false)),
            CircuitState::Open => {
                let elapsed = inner.last_failure.map(|at| at.elapsed());
                let recovered = elapsed.map_or(true, |e| e >= self.recovery_timeout);
                if !recovered {
                    return Err(ApiError::CircuitOpen {
                        last_failure_secs_ago: elapsed.unwrap_or_default().as_secs_f64(),
                    });
                }
                inner.state = CircuitState::HalfOpen;
                inner.probe_in_flight = true;
                drop(inner);

                tracing::info!(breaker = %self.name, "Circuit breaker transitioning to HALF_OPEN");
                metrics::record_breaker_state(&self.name, CircuitState::HalfOpen);
                Ok(Permit::new(self, true))
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    let elapsed = inner.last_failure.map(|at| at.elapsed()).unwrap_or_default();
                    return Err(ApiError::CircuitOpen {
                        last_failure_secs_ago: elapsed.as_secs_f64(),
                    });
                }
                inner.probe_in_flight = true;
                Ok(Permit::new(self, true))
            }
        }
    }

    fn on_success(&self, probe: bool) {
        let mut inner = self.inner.lock();
        if probe {
            inner.probe_in_flight = false;
        }
        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen if probe => {
                inner.failure_count = 0;
                inner.state = CircuitState::Closed;
                drop(inner);

                tracing::info!(breaker = %self.name, "Circuit breaker reset to CLOSED");
                metrics::record_breaker_state(&self.name, CircuitState::Closed);
            }
            // Admitted before the circuit opened; says nothing about recovery.
            _ => {}
        }
    }

    fn on_failure(&self, probe: bool) {
        let mut inner = self.inner.lock();
        if probe {
            inner.probe_in_flight = false;
        }
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        inner.last_failure_unix = Some(unix_now());

        let trip = match inner.state {
            CircuitState::Closed => inner.failure_count >= self.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };
        if trip {
            inner.state = CircuitState::Open;
            let failures = inner.failure_count;
            drop(inner);

            tracing::warn!(breaker = %self.name, failures, "Circuit breaker OPEN");
            metrics::record_breaker_state(&self.name, CircuitState::Open);
        }
    }

    fn on_abandoned(&self, probe: bool) {
        if probe {
            self.inner.lock().probe_in_flight = false;
        }
    }
}

/// Admission ticket for one call.
///
/// Holds the half-open probe slot when `probe` is set. Dropping a permit
/// without reporting an outcome (e.g. the caller's future was cancelled)
/// frees the slot and leaves the state unchanged.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker, probe: bool) -> Self {
        Self { breaker, probe, settled: false }
    }

    fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success(self.probe);
    }

    fn fail(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.probe);
    }

    fn release(self) {
        // Drop does the work.
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_abandoned(self.probe);
        }
    }
}

pub(crate) fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
