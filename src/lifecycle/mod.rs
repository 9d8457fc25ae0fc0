//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Trigger → HTTP server stops accepting → in-flight requests drain
//!     → cleanup() closes the upstream session
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - Cleanup runs once, after the server has returned

pub mod shutdown;
pub mod signals;

pub use shutdown::{cleanup, Shutdown};
