//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → retries.rs (run_with_retry: backoff between attempts, stop on non-retryable)
//!         → circuit_breaker.rs (fail fast when open, count infrastructure failures)
//!             → transport call (timeouts enforced by the HTTP client)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - Unknown errors are not retried
//! - Circuit breaker prevents cascading failures
//! - Each stage is a plain function/struct composed by the caller

pub mod backoff;
pub mod circuit_breaker;
pub mod error;
pub mod retries;

pub use backoff::RetryPolicy;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerSnapshot, CircuitState};
pub use error::{ApiError, ApiResult};
pub use retries::{is_retryable, is_retryable_status, run_with_retry, RetryMetrics, RetryStats};
