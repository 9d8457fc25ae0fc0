//! Metrics collection and exposition.
//!
//! # Metrics
//! - `upstream_requests_total` (counter): upstream calls by outcome
//! - `upstream_request_duration_seconds` (histogram): end-to-end latency incl. retries
//! - `upstream_retry_attempts_total` (counter): individual attempts by outcome
//! - `circuit_breaker_transitions_total` (counter): transitions by target state
//! - `circuit_breaker_state` (gauge): 0=closed, 1=half_open, 2=open
//! - `health_check_cache_hits_total` (counter)
//! - `http_requests_total` (counter): inbound requests by path, status
//! - `rate_limited_total` (counter)
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one completed upstream call (after retries).
pub fn record_upstream_request(outcome: &str, start: Instant) {
    counter!("upstream_requests_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("upstream_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record one attempt inside the retry loop.
pub fn record_retry_attempt(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("upstream_retry_attempts_total", "outcome" => outcome).increment(1);
}

/// Record a circuit breaker transition.
pub fn record_breaker_state(breaker: &str, state: CircuitState) {
    counter!(
        "circuit_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "to" => state.as_str()
    )
    .increment(1);

    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!("circuit_breaker_state", "breaker" => breaker.to_string()).set(value);
}

/// Record a connectivity result served from cache.
pub fn record_health_cache_hit(check: &str) {
    counter!("health_check_cache_hits_total", "check" => check.to_string()).increment(1);
}

/// Record an inbound HTTP request.
pub fn record_http_request(path: &str, status: u16) {
    counter!(
        "http_requests_total",
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a request rejected by the rate limiter.
pub fn record_rate_limited() {
    counter!("rate_limited_total").increment(1);
}
