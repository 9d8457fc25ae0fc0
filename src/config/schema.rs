//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener and auth settings.
    pub server: ListenerConfig,

    /// Upstream API settings.
    pub upstream: UpstreamConfig,

    /// Connection pool limits.
    pub pool: PoolConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Circuit breaker configuration.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Health report settings.
    pub health: HealthConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8000").
    pub bind_address: String,

    /// Require a bearer token on tool endpoints.
    pub auth_required: bool,

    /// Upper bound for handling one inbound request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            auth_required: true,
            request_timeout_secs: 60,
        }
    }
}

/// Upstream API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream API.
    pub base_url: String,

    /// Path probed by the connectivity check.
    pub health_path: String,

    /// API key sent as `x-api-key`. Usually supplied via `VECTARA_API_KEY`.
    pub api_key: Option<String>,

    /// Probe latency above which connectivity is reported as degraded.
    pub slow_threshold_ms: u64,

    /// Raise 408/429 responses as errors so they are retried and counted by
    /// the circuit breaker. Off by default: they are returned to the caller.
    pub treat_throttling_as_failure: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.vectara.io".to_string(),
            health_path: "/health".to_string(),
            api_key: None,
            slow_threshold_ms: 2000,
            treat_throttling_as_failure: false,
        }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum concurrent in-flight upstream requests.
    pub max_connections: usize,

    /// Maximum idle connections kept per host.
    pub max_per_host: usize,

    /// Idle keep-alive timeout in seconds.
    pub keepalive_timeout_secs: u64,

    /// DNS cache TTL in seconds.
    pub dns_cache_ttl_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 100,
            max_per_host: 30,
            keepalive_timeout_secs: 30,
            dns_cache_ttl_secs: 300,
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time for request/response in seconds.
    pub total_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Socket read timeout in seconds.
    pub read_secs: u64,

    /// Timeout for the connectivity probe in seconds.
    pub health_check_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            total_secs: 30,
            connect_secs: 10,
            read_secs: 20,
            health_check_secs: 5,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive counted failures before the circuit opens.
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before a probe is allowed.
    pub recovery_timeout_secs: f64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 60.0,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds.
    pub initial_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Backoff multiplier.
    pub exponential_base: f64,

    /// Randomize delays to avoid synchronized retries.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

/// Health report configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// How long a connectivity result is reused, in seconds.
    pub cache_ttl_secs: u64,

    /// Service name reported by probes.
    pub service_name: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 5,
            service_name: "vectara-mcp-server".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting on tool endpoints.
    pub enabled: bool,

    /// Requests allowed per client per window.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_secs: 60,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}' (expected pretty or json)", other)),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
