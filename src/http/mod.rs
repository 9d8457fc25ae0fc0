//! HTTP front end.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → request.rs (request id, span, metrics)
//!     → server.rs (router, timeout, security layers)
//!     → handlers.rs
//!         /health, /ready, /health/detailed → health::HealthAggregator
//!         /stats                            → upstream::ConnectionManager
//!         /tools/{name}                     → tools::Tools
//!     → JSON response
//! ```

pub mod handlers;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
