//! Tiered health reports with a short-lived connectivity cache.
//!
//! # Responsibilities
//! - Liveness: constant time, no dependency calls
//! - Readiness: pool state + upstream connectivity
//! - Detailed: readiness plus breaker severity, retry stats, process memory
//!
//! Collaborator failures become `Unhealthy` checks. Nothing here propagates
//! an error to the caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::json;
use tokio::time::Instant;

use crate::config::ServerConfig;
use crate::health::check::{
    DetailedMetrics, DetailedReport, HealthCheck, HealthStatus, LivenessReport, ReadinessReport,
    ServerInfo,
};
use crate::health::process;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::unix_now;
use crate::resilience::{ApiResult, CircuitState, RetryStats};
use crate::upstream::connection::round_ms;
use crate::upstream::{ConnectionManager, ConnectionStats, ProbeStatus, UpstreamHealth};

const UPSTREAM_CHECK: &str = "vectara_api";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// What the aggregator needs from the connection layer.
pub trait HealthSource: Send + Sync {
    /// Make sure the pooled session exists.
    fn initialize(&self) -> impl Future<Output = ApiResult<()>> + Send;

    fn stats(&self) -> ConnectionStats;

    fn retry_stats(&self) -> RetryStats;

    /// Probe upstream connectivity.
    fn check_upstream(&self) -> impl Future<Output = ApiResult<UpstreamHealth>> + Send;
}

impl HealthSource for ConnectionManager {
    async fn initialize(&self) -> ApiResult<()> {
        ConnectionManager::initialize(self).await
    }

    fn stats(&self) -> ConnectionStats {
        ConnectionManager::stats(self)
    }

    fn retry_stats(&self) -> RetryStats {
        self.retry_metrics().stats()
    }

    async fn check_upstream(&self) -> ApiResult<UpstreamHealth> {
        Ok(self.health_check(self.base_url()).await)
    }
}

struct CachedCheck {
    check: HealthCheck,
    observed_at: Instant,
}

pub struct HealthAggregator<S> {
    source: Arc<S>,
    cache: DashMap<&'static str, CachedCheck>,
    cache_ttl: Duration,
    slow_threshold: Duration,
    service: String,
    started_at: std::time::Instant,
}

impl<S: HealthSource> HealthAggregator<S> {
    pub fn new(source: Arc<S>, config: &ServerConfig) -> Self {
        Self {
            source,
            cache: DashMap::new(),
            cache_ttl: Duration::from_secs(config.health.cache_ttl_secs),
            slow_threshold: Duration::from_millis(config.upstream.slow_threshold_ms),
            service: config.health.service_name.clone(),
            started_at: std::time::Instant::now(),
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    fn uptime_seconds(&self) -> f64 {
        (self.started_at.elapsed().as_secs_f64() * 100.0).round() / 100.0
    }

    /// Is the process alive. Always healthy.
    pub fn liveness(&self) -> LivenessReport {
        LivenessReport {
            status: HealthStatus::Healthy,
            timestamp: unix_now(),
            uptime_seconds: self.uptime_seconds(),
            version: VERSION.to_string(),
            service: self.service.clone(),
        }
    }

    /// Can the process serve traffic right now.
    pub async fn readiness(&self) -> ReadinessReport {
        let start = Instant::now();

        let connection = self.check_connection_manager().await;
        let upstream = self.check_upstream().await;

        let status = if !connection.status.is_healthy() || upstream.status == HealthStatus::Unhealthy {
            HealthStatus::Unhealthy
        } else if upstream.status == HealthStatus::Degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        ReadinessReport {
            status,
            timestamp: unix_now(),
            response_time_ms: round_ms(start.elapsed()),
            checks: vec![connection, upstream],
        }
    }

    /// Everything readiness reports plus breaker severity and process metrics.
    pub async fn detailed(&self) -> DetailedReport {
        let start = Instant::now();

        let connection = self.check_connection_manager_detailed().await;
        let upstream = self.check_upstream().await;
        let status = connection.status.worst(upstream.status);

        DetailedReport {
            status,
            timestamp: unix_now(),
            response_time_ms: round_ms(start.elapsed()),
            server: ServerInfo {
                uptime_seconds: self.uptime_seconds(),
                version: VERSION.to_string(),
                service: self.service.clone(),
                pid: std::process::id(),
            },
            checks: vec![connection, upstream],
            metrics: DetailedMetrics {
                retry: self.source.retry_stats(),
                memory: process::memory_report(),
            },
        }
    }

    async fn check_connection_manager(&self) -> HealthCheck {
        const NAME: &str = "connection_manager";
        let start = Instant::now();

        if let Err(err) = self.source.initialize().await {
            return HealthCheck::new(NAME, HealthStatus::Unhealthy, format!("Connection manager error: {}", err))
                .with_response_time(round_ms(start.elapsed()));
        }

        let stats = self.source.stats();
        let elapsed = round_ms(start.elapsed());

        if stats.session_initialized {
            HealthCheck::new(NAME, HealthStatus::Healthy, "Connection manager initialized and ready")
                .with_response_time(elapsed)
                .with_details(json!({ "circuit_breaker_state": stats.circuit_breaker.state }))
        } else {
            HealthCheck::new(NAME, HealthStatus::Unhealthy, "Connection manager not initialized")
                .with_response_time(elapsed)
        }
    }

    async fn check_connection_manager_detailed(&self) -> HealthCheck {
        const NAME: &str = "connection_manager_detailed";
        let start = Instant::now();

        if let Err(err) = self.source.initialize().await {
            return HealthCheck::new(NAME, HealthStatus::Unhealthy, format!("Connection manager error: {}", err))
                .with_response_time(round_ms(start.elapsed()));
        }

        let stats = self.source.stats();
        let elapsed = round_ms(start.elapsed());

        if !stats.session_initialized {
            return HealthCheck::new(NAME, HealthStatus::Unhealthy, "Connection manager not initialized")
                .with_response_time(elapsed);
        }

        let failures = stats.circuit_breaker.failure_count;
        let (status, message) = match stats.circuit_breaker.state {
            CircuitState::Open => (
                HealthStatus::Unhealthy,
                format!("Circuit breaker OPEN with {} failures", failures),
            ),
            CircuitState::HalfOpen => (HealthStatus::Degraded, "Circuit breaker testing recovery".to_string()),
            CircuitState::Closed if failures > 0 => {
                (HealthStatus::Degraded, format!("Recent failures: {}", failures))
            }
            CircuitState::Closed => (HealthStatus::Healthy, "Connection manager healthy".to_string()),
        };

        let details = serde_json::to_value(&stats).unwrap_or_default();
        HealthCheck::new(NAME, status, message)
            .with_response_time(elapsed)
            .with_details(details)
    }

    /// Upstream connectivity, served from cache while fresh.
    async fn check_upstream(&self) -> HealthCheck {
        if let Some(entry) = self.cache.get(UPSTREAM_CHECK) {
            if entry.observed_at.elapsed() < self.cache_ttl {
                metrics::record_health_cache_hit(UPSTREAM_CHECK);
                return entry.check.clone();
            }
        }

        let start = Instant::now();
        let result = self.source.check_upstream().await;
        let elapsed = round_ms(start.elapsed());

        let check = match result {
            Ok(probe) => self.classify_probe(probe).with_response_time(elapsed),
            Err(err) => HealthCheck::new(
                UPSTREAM_CHECK,
                HealthStatus::Unhealthy,
                format!("Vectara API connectivity failed: {}", err),
            )
            .with_response_time(elapsed),
        };

        self.cache.insert(
            UPSTREAM_CHECK,
            CachedCheck {
                check: check.clone(),
                observed_at: Instant::now(),
            },
        );
        check
    }

    fn classify_probe(&self, probe: UpstreamHealth) -> HealthCheck {
        let latency = probe.response_time_ms;
        let (status, message) = match probe.status {
            ProbeStatus::Healthy if latency > self.slow_threshold.as_secs_f64() * 1000.0 => (
                HealthStatus::Degraded,
                format!("Vectara API slow ({}ms)", latency),
            ),
            ProbeStatus::Healthy => (
                HealthStatus::Healthy,
                format!("Vectara API accessible ({}ms)", latency),
            ),
            ProbeStatus::Unhealthy => (
                HealthStatus::Degraded,
                format!(
                    "Vectara API issues: {}",
                    probe.error.as_deref().unwrap_or("Unknown error")
                ),
            ),
        };

        HealthCheck::new(UPSTREAM_CHECK, status, message).with_details(json!({
            "api_response_time_ms": latency,
            "status_code": probe.status_code,
            "circuit_breaker_state": probe.circuit_breaker_state,
        }))
    }
}
