//! Per-client token bucket rate limiting.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use serde_json::json;

use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::security::auth::extract_token;

struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whether the bucket would be back at capacity by `now`.
    fn is_full(&self, now: Instant, capacity: f64, refill_rate: f64) -> bool {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens + elapsed * refill_rate >= capacity
    }
}

const DEFAULT_MAX_TRACKED_CLIENTS: usize = 10_000;

/// `max_requests` burst, refilled evenly over `window_secs`.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    enabled: bool,
    capacity: f64,
    refill_rate: f64,
    max_tracked: usize,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = f64::from(config.max_requests.max(1));
        let window = config.window_secs.max(1) as f64;
        Self {
            buckets: Mutex::new(HashMap::new()),
            enabled: config.enabled,
            capacity,
            refill_rate: capacity / window,
            max_tracked: DEFAULT_MAX_TRACKED_CLIENTS,
        }
    }

    /// Bound on tracked clients before idle buckets are pruned.
    pub fn with_max_tracked(mut self, max_tracked: usize) -> Self {
        self.max_tracked = max_tracked.max(1);
        self
    }

    /// Take one token for `client`.
    pub fn check(&self, client: &str) -> bool {
        if !self.enabled {
            return true;
        }
        let mut buckets = self.buckets.lock();
        if buckets.len() >= self.max_tracked && !buckets.contains_key(client) {
            // A full bucket is indistinguishable from a fresh one.
            let now = Instant::now();
            let before = buckets.len();
            buckets.retain(|_, b| !b.is_full(now, self.capacity, self.refill_rate));
            tracing::debug!(pruned = before - buckets.len(), "Pruned idle rate limit buckets");
        }
        let bucket = buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity));
        bucket.try_acquire(self.capacity, self.refill_rate)
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().len()
    }
}

/// Clients are keyed by token when one is presented, otherwise by IP.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = match extract_token(request.headers()) {
        Some(token) => format!("token:{}", token),
        None => request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| format!("ip:{}", addr.ip()))
            .unwrap_or_else(|| "anonymous".to_string()),
    };

    if limiter.check(&key) {
        return next.run(request).await;
    }

    tracing::warn!(client = %key.split(':').next().unwrap_or_default(), "Rate limit exceeded");
    metrics::record_rate_limited();
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "error": "Rate limit exceeded. Please retry later." })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, enabled: bool) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled,
            max_requests,
            window_secs: 60,
        })
    }

    #[test]
    fn test_burst_then_reject() {
        let limiter = limiter(3, true);

        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = limiter(1, true);

        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        assert!(limiter.check("b"));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_disabled() {
        let limiter = limiter(1, false);
        for _ in 0..10 {
            assert!(limiter.check("a"));
        }
    }

    #[test]
    fn test_idle_clients_are_pruned() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: true,
            max_requests: 1000,
            window_secs: 1,
        })
        .with_max_tracked(2);

        assert!(limiter.check("a"));
        assert!(limiter.check("b"));
        assert_eq!(limiter.tracked_clients(), 2);

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(limiter.check("c"));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_busy_clients_are_kept() {
        let limiter = limiter(2, true).with_max_tracked(2);

        assert!(limiter.check("a"));
        assert!(limiter.check("b"));
        assert!(limiter.check("c"));
        assert_eq!(limiter.tracked_clients(), 3);

        // "a" keeps its drained bucket.
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
    }

    #[test]
    fn test_refill() {
        let mut bucket = TokenBucket::new(1.0);
        assert!(bucket.try_acquire(1.0, 1000.0));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(bucket.try_acquire(1.0, 1000.0));
    }
}
