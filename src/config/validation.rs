//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= 1, timeouts > 0)
//! - Validate URLs and bind addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }

    match url::Url::parse(&config.upstream.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "upstream.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("upstream.base_url", e.to_string())),
    }

    if !config.upstream.health_path.starts_with('/') {
        errors.push(ValidationError::new("upstream.health_path", "must start with '/'"));
    }

    if config.pool.max_connections == 0 {
        errors.push(ValidationError::new("pool.max_connections", "must be at least 1"));
    }
    if config.pool.max_per_host > config.pool.max_connections {
        errors.push(ValidationError::new(
            "pool.max_per_host",
            "must not exceed pool.max_connections",
        ));
    }

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.total_secs", timeouts.total_secs),
        ("timeouts.connect_secs", timeouts.connect_secs),
        ("timeouts.read_secs", timeouts.read_secs),
        ("timeouts.health_check_secs", timeouts.health_check_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.failure_threshold", "must be at least 1"));
    }
    let recovery = config.circuit_breaker.recovery_timeout_secs;
    if !recovery.is_finite() || recovery < 0.0 {
        errors.push(ValidationError::new(
            "circuit_breaker.recovery_timeout_secs",
            "must be a non-negative number",
        ));
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if !retries.exponential_base.is_finite() || retries.exponential_base < 1.0 {
        errors.push(ValidationError::new("retries.exponential_base", "must be >= 1.0"));
    }
    if retries.initial_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.initial_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    if config.rate_limit.enabled && (config.rate_limit.max_requests == 0 || config.rate_limit.window_secs == 0) {
        errors.push(ValidationError::new(
            "rate_limit",
            "max_requests and window_secs must be greater than zero",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
