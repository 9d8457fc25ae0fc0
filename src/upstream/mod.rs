//! Upstream API access subsystem.
//!
//! # Data Flow
//! ```text
//! Tool handler / health probe
//!     → connection.rs (ensure pooled session exists)
//!     → resilience::run_with_retry
//!         → resilience::CircuitBreaker::call
//!             → reqwest send (connect/read/total timeouts)
//!     ← response (4xx passed through) or ApiError
//! ```
//!
//! # Design Decisions
//! - Exactly one pooled session per process
//! - The session is created lazily and can be closed and recreated

pub mod connection;
pub mod request;

pub use connection::{ConnectionManager, ConnectionStats, PoolUsage, ProbeStatus, UpstreamHealth};
pub use request::UpstreamRequest;
