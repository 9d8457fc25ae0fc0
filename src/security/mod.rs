//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming tool request:
//!     → origin.rs (browser origin allow-list)
//!     → auth.rs (bearer token / X-API-Key)
//!     → rate_limit.rs (per-client token bucket)
//!     → tool handler
//!
//! Every response:
//!     → headers.rs (security headers)
//! ```
//!
//! # Design Decisions
//! - Probe endpoints stay public so orchestrators can reach them
//! - Fail closed: reject on any security check failure

pub mod auth;
pub mod headers;
pub mod origin;
pub mod rate_limit;

pub use auth::{auth_middleware, extract_token, TokenAuth};
pub use headers::with_security_headers;
pub use origin::{origin_middleware, OriginPolicy};
pub use rate_limit::{rate_limit_middleware, RateLimiter};
