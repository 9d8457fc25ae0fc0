//! Vectara MCP server library.
//!
//! Resilient access to the Vectara API: a pooled upstream session guarded by
//! retries with backoff and a circuit breaker, tiered health probes, and
//! HTTP tool endpoints on top.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod tools;
pub mod upstream;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use upstream::ConnectionManager;
