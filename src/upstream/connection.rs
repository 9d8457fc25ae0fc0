//! Pooled connection management for the upstream API.
//!
//! # Responsibilities
//! - Own the single pooled HTTP client (lazy init, explicit close)
//! - Route every outbound call through retry → circuit breaker → transport
//! - Bound concurrent in-flight requests
//! - Report stats and probe upstream connectivity
//!
//! # Design Decisions
//! - One manager per process, constructed in `main` and passed around as `Arc`
//! - 5xx responses are raised as errors so they trip the breaker and retry;
//!   4xx responses are returned to the caller untouched
//! - TLS verification is always on (reqwest default, never disabled)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Method, Response};
use serde::Serialize;
use tokio::sync::{RwLock, Semaphore};

use crate::config::{PoolConfig, ServerConfig, TimeoutConfig};
use crate::observability::metrics;
use crate::resilience::{
    run_with_retry, ApiError, ApiResult, CircuitBreaker, CircuitBreakerSnapshot, CircuitState,
    RetryMetrics, RetryPolicy,
};
use crate::upstream::request::UpstreamRequest;

const USER_AGENT_VALUE: &str = concat!("vectara-mcp/", env!("CARGO_PKG_VERSION"));

/// Limit on how much of an error body is kept in the error message.
const ERROR_BODY_LIMIT: usize = 512;

/// Pool usage at the moment stats were taken.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolUsage {
    pub max_connections: usize,
    pub available_permits: usize,
}

/// Read-only view of the connection manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStats {
    pub session_initialized: bool,
    pub circuit_breaker: CircuitBreakerSnapshot,
    pub pool_config: PoolConfig,
    pub connection_pool: PoolUsage,
}

/// Outcome of a connectivity probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Healthy,
    Unhealthy,
}

/// Result of [`ConnectionManager::health_check`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamHealth {
    pub status: ProbeStatus,
    pub response_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub circuit_breaker_state: CircuitState,
}

/// Owns the pooled HTTP session to the upstream API.
pub struct ConnectionManager {
    client: RwLock<Option<Client>>,
    initialized: AtomicBool,
    breaker: CircuitBreaker,
    retry_policy: RetryPolicy,
    retry_metrics: RetryMetrics,
    pool: PoolConfig,
    timeouts: TimeoutConfig,
    permits: Arc<Semaphore>,
    base_url: String,
    health_path: String,
    treat_throttling_as_failure: bool,
}

impl ConnectionManager {
    /// Build a manager from configuration. No connection is opened yet.
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            client: RwLock::new(None),
            initialized: AtomicBool::new(false),
            breaker: CircuitBreaker::from_config("upstream", &config.circuit_breaker),
            retry_policy: RetryPolicy::from(&config.retries),
            retry_metrics: RetryMetrics::new(),
            pool: config.pool.clone(),
            timeouts: config.timeouts.clone(),
            permits: Arc::new(Semaphore::new(config.pool.max_connections.max(1))),
            base_url: config.upstream.base_url.trim_end_matches('/').to_string(),
            health_path: config.upstream.health_path.clone(),
            treat_throttling_as_failure: config.upstream.treat_throttling_as_failure,
        }
    }

    /// Create the pooled session if it does not exist yet.
    ///
    /// Idempotent and safe to call concurrently; only the first caller builds.
    pub async fn initialize(&self) -> ApiResult<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut guard = self.client.write().await;
        if guard.is_some() {
            return Ok(());
        }

        *guard = Some(self.build_client()?);
        self.initialized.store(true, Ordering::Release);

        tracing::info!(
            max_connections = self.pool.max_connections,
            max_per_host = self.pool.max_per_host,
            "Connection manager initialized with persistent session"
        );
        Ok(())
    }

    /// Release the pooled session. Safe to call when uninitialized.
    pub async fn close(&self) {
        let mut guard = self.client.write().await;
        if guard.take().is_some() {
            self.initialized.store(false, Ordering::Release);
            tracing::info!("Connection manager closed");
        }
    }

    /// Issue a request through retry and circuit breaker protection.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        headers: Option<HeaderMap>,
        json: Option<serde_json::Value>,
    ) -> ApiResult<Response> {
        let mut req = UpstreamRequest::new(method, url);
        if let Some(headers) = headers {
            req = req.headers(headers);
        }
        if let Some(body) = json {
            req = req.json(body);
        }
        self.execute(req).await
    }

    /// Execute a prepared request with the full retry envelope.
    pub async fn execute(&self, req: UpstreamRequest) -> ApiResult<Response> {
        let start = Instant::now();
        let client = self.session().await?;

        let client = &client;
        let req = &req;
        let breaker = &self.breaker;
        let result = run_with_retry(&self.retry_policy, &self.retry_metrics, move || {
            breaker.call(move || self.send_once(client, req))
        })
        .await;

        metrics::record_upstream_request(outcome_label(&result), start);
        result
    }

    /// Execute a request once, through the circuit breaker but without retries.
    pub async fn execute_once(&self, req: UpstreamRequest) -> ApiResult<Response> {
        let start = Instant::now();
        let client = self.session().await?;
        let result = self.breaker.call(|| self.send_once(&client, &req)).await;

        metrics::record_upstream_request(outcome_label(&result), start);
        result
    }

    /// Probe `{base_url}{health_path}` once with the short health timeout.
    ///
    /// Never fails: every error is folded into the returned value.
    pub async fn health_check(&self, base_url: &str) -> UpstreamHealth {
        let start = Instant::now();
        let url = format!("{}{}", base_url.trim_end_matches('/'), self.health_path);
        let req = UpstreamRequest::get(url).timeout(Duration::from_secs(self.timeouts.health_check_secs));

        let result = self.execute_once(req).await;
        let response_time_ms = round_ms(start.elapsed());

        match result {
            Ok(response) => UpstreamHealth {
                status: ProbeStatus::Healthy,
                response_time_ms,
                status_code: Some(response.status().as_u16()),
                error: None,
                circuit_breaker_state: self.breaker.state(),
            },
            Err(err) => {
                tracing::debug!(error = %err, "Upstream health probe failed");
                UpstreamHealth {
                    status: ProbeStatus::Unhealthy,
                    response_time_ms,
                    status_code: err.status(),
                    error: Some(err.to_string()),
                    circuit_breaker_state: self.breaker.state(),
                }
            }
        }
    }

    /// Stats snapshot. No side effects.
    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            session_initialized: self.initialized.load(Ordering::Acquire),
            circuit_breaker: self.breaker.snapshot(),
            pool_config: self.pool.clone(),
            connection_pool: PoolUsage {
                max_connections: self.pool.max_connections,
                available_permits: self.permits.available_permits(),
            },
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn retry_metrics(&self) -> &RetryMetrics {
        &self.retry_metrics
    }

    /// Base URL of the upstream API, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn session(&self) -> ApiResult<Client> {
        self.initialize().await?;
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| ApiError::Transport("session closed while request was starting".to_string()))
    }

    fn build_client(&self) -> ApiResult<Client> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let keepalive = Duration::from_secs(self.pool.keepalive_timeout_secs);
        Client::builder()
            .default_headers(headers)
            .pool_max_idle_per_host(self.pool.max_per_host)
            .pool_idle_timeout(keepalive)
            .tcp_keepalive(keepalive)
            .connect_timeout(Duration::from_secs(self.timeouts.connect_secs))
            .read_timeout(Duration::from_secs(self.timeouts.read_secs))
            .timeout(Duration::from_secs(self.timeouts.total_secs))
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {}", e)))
    }

    async fn send_once(&self, client: &Client, req: &UpstreamRequest) -> ApiResult<Response> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ApiError::Transport("connection pool closed".to_string()))?;

        let mut builder = client
            .request(req.method.clone(), &req.url)
            .headers(req.headers.clone());
        if let Some(body) = &req.json {
            builder = builder.json(body);
        }
        if let Some(timeout) = req.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();

        let raise = status.is_server_error()
            || (self.treat_throttling_as_failure && matches!(status.as_u16(), 408 | 429));
        if raise {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                status.canonical_reason().unwrap_or("upstream error").to_string()
            } else {
                truncate(&body, ERROR_BODY_LIMIT)
            };
            tracing::debug!(status = status.as_u16(), url = %req.url, "Upstream returned error status");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("base_url", &self.base_url)
            .field("initialized", &self.initialized.load(Ordering::Relaxed))
            .field("breaker", &self.breaker.state())
            .finish()
    }
}

fn outcome_label(result: &ApiResult<Response>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(err) => err.kind(),
    }
}

/// Milliseconds rounded to two decimals.
pub(crate) fn round_ms(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100_000.0).round() / 100.0
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let manager = ConnectionManager::new(&ServerConfig::default());
        assert!(!manager.stats().session_initialized);

        manager.initialize().await.unwrap();
        manager.initialize().await.unwrap();
        assert!(manager.stats().session_initialized);
    }

    #[tokio::test]
    async fn test_concurrent_initialize() {
        let manager = Arc::new(ConnectionManager::new(&ServerConfig::default()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.initialize().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(manager.stats().session_initialized);
    }

    #[tokio::test]
    async fn test_close_is_safe_when_uninitialized() {
        let manager = ConnectionManager::new(&ServerConfig::default());
        manager.close().await;
        manager.close().await;
        assert!(!manager.stats().session_initialized);

        manager.initialize().await.unwrap();
        manager.close().await;
        assert!(!manager.stats().session_initialized);
    }

    #[test]
    fn test_stats_are_stable() {
        let manager = ConnectionManager::new(&ServerConfig::default());
        let first = manager.stats();

        assert_eq!(first, manager.stats());
        assert_eq!(first.pool_config.max_connections, 100);
        assert_eq!(first.connection_pool.available_permits, 100);
        assert_eq!(first.circuit_breaker.state, CircuitState::Closed);
    }

    #[test]
    fn test_stats_serialize_shape() {
        let manager = ConnectionManager::new(&ServerConfig::default());
        let json = serde_json::to_value(manager.stats()).unwrap();

        assert_eq!(json["session_initialized"], false);
        assert_eq!(json["circuit_breaker"]["state"], "closed");
        assert_eq!(json["pool_config"]["max_per_host"], 30);
    }

    #[test]
    fn test_round_ms() {
        assert_eq!(round_ms(Duration::from_micros(12_345)), 12.35);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }

    #[test]
    fn test_url_join() {
        let mut config = ServerConfig::default();
        config.upstream.base_url = "http://localhost:1234/".to_string();
        let manager = ConnectionManager::new(&config);
        assert_eq!(manager.url("/v2/query"), "http://localhost:1234/v2/query");
    }
}
