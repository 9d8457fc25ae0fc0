//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Probe endpoint (/health, /ready, /health/detailed)
//!     → aggregator.rs
//!         → HealthSource (connection manager: init state, stats, retry stats)
//!         → upstream probe (cached for a few seconds)
//!         → process.rs (memory, detailed tier only)
//!     ← report with top-level status
//! ```
//!
//! # Design Decisions
//! - Liveness never touches dependencies
//! - Readiness separates "pool broken" (unhealthy) from "upstream slow" (degraded)
//! - Health checks never propagate errors

pub mod aggregator;
pub mod check;
pub mod process;

pub use aggregator::{HealthAggregator, HealthSource};
pub use check::{DetailedReport, HealthCheck, HealthStatus, LivenessReport, ReadinessReport};
