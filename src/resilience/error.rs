//! Upstream error taxonomy.
//!
//! Every failure that can come out of the request pipeline is one of these
//! variants. The retry policy and the circuit breaker both classify errors by
//! variant rather than by message.

use thiserror::Error;

/// Errors that can occur while talking to the upstream API.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Request exceeded one of its timeouts (total, connect or read).
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection could not be established or was reset (includes DNS failures).
    #[error("connection error: {0}")]
    Connect(String),

    /// Upstream answered with an error status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Circuit breaker rejected the call without contacting upstream.
    #[error("circuit breaker open (last failure {last_failure_secs_ago:.1}s ago)")]
    CircuitOpen { last_failure_secs_ago: f64 },

    /// Explicitly marked as safe to retry.
    #[error("retryable: {0}")]
    Retryable(String),

    /// Explicitly marked as not to be retried.
    #[error("non-retryable: {0}")]
    NonRetryable(String),

    /// Any other transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Missing credential or invalid configuration, detected before any I/O.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for upstream operations.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this error counts toward the circuit breaker's failure threshold.
    ///
    /// Only infrastructure-level failures count. A status error only reaches
    /// this point when the connection manager decided to raise it (5xx, or
    /// 408/429 when throttling is treated as failure).
    pub fn is_breaker_failure(&self) -> bool {
        match self {
            ApiError::Timeout(_) | ApiError::Connect(_) | ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }

    /// Short label used for metrics and retry statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Timeout(_) => "timeout",
            ApiError::Connect(_) => "connect",
            ApiError::Status { .. } => "status",
            ApiError::CircuitOpen { .. } => "circuit_open",
            ApiError::Retryable(_) => "retryable",
            ApiError::NonRetryable(_) => "non_retryable",
            ApiError::Transport(_) => "transport",
            ApiError::Decode(_) => "decode",
            ApiError::Config(_) => "config",
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_timeout() {
            ApiError::Timeout(message)
        } else if err.is_connect() {
            ApiError::Connect(message)
        } else if let Some(status) = err.status() {
            ApiError::Status {
                status: status.as_u16(),
                message,
            }
        } else if err.is_decode() {
            ApiError::Decode(message)
        } else if err.is_builder() {
            ApiError::Config(message)
        } else {
            ApiError::Transport(message)
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}
