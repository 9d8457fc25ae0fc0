//! Browser origin allow-list.
//!
//! Requests without an `Origin` header are not browser requests and pass.
//! Patterns ending in `*` match by prefix; a lone `*` matches everything.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::ORIGIN, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub const ENV_ALLOWED_ORIGINS: &str = "VECTARA_ALLOWED_ORIGINS";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:*";

#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    /// Parse a comma-separated pattern list.
    pub fn parse(list: &str) -> Self {
        Self {
            allowed: list
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn from_env() -> Self {
        let list = std::env::var(ENV_ALLOWED_ORIGINS).unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string());
        Self::parse(&list)
    }

    pub fn is_allowed(&self, origin: Option<&str>) -> bool {
        let Some(origin) = origin else {
            return true;
        };
        self.allowed.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => origin.starts_with(prefix),
            None => origin == pattern,
        })
    }
}

pub async fn origin_middleware(
    State(policy): State<Arc<OriginPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = request.headers().get(ORIGIN).and_then(|h| h.to_str().ok());
    if policy.is_allowed(origin) {
        return next.run(request).await;
    }

    tracing::warn!(origin = origin.unwrap_or_default(), "Rejected request from unauthorized origin");
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": "Origin not allowed." })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = OriginPolicy::parse(DEFAULT_ALLOWED_ORIGINS);

        assert!(policy.is_allowed(None));
        assert!(policy.is_allowed(Some("http://localhost:3000")));
        assert!(!policy.is_allowed(Some("https://evil.example")));
    }

    #[test]
    fn test_exact_and_wildcard() {
        let policy = OriginPolicy::parse("https://app.example.com, *");
        assert!(policy.is_allowed(Some("https://anything.example")));

        let policy = OriginPolicy::parse("https://app.example.com");
        assert!(policy.is_allowed(Some("https://app.example.com")));
        assert!(!policy.is_allowed(Some("https://app.example.com.evil")));
    }
}
