//! Bearer token authentication for tool endpoints.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub const ENV_AUTHORIZED_TOKENS: &str = "VECTARA_AUTHORIZED_TOKENS";
pub const X_API_KEY: &str = "x-api-key";

/// Set of accepted bearer tokens.
#[derive(Debug, Clone)]
pub struct TokenAuth {
    required: bool,
    tokens: HashSet<String>,
}

impl TokenAuth {
    pub fn new(required: bool, tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            required,
            tokens: tokens.into_iter().filter(|t| !t.is_empty()).collect(),
        }
    }

    /// Accept the upstream API key plus a comma-separated list of extra tokens.
    pub fn from_sources(required: bool, api_key: Option<&str>, extra: Option<&str>) -> Self {
        let extra = extra
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Self::new(required, api_key.map(str::to_string).into_iter().chain(extra))
    }

    /// Like [`TokenAuth::from_sources`], reading extra tokens from the environment.
    pub fn from_env(required: bool, api_key: Option<&str>) -> Self {
        let extra = std::env::var(ENV_AUTHORIZED_TOKENS).ok();
        Self::from_sources(required, api_key, extra.as_deref())
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn validate(&self, token: Option<&str>) -> bool {
        if !self.required {
            return true;
        }
        match token {
            Some(token) => self.tokens.contains(token),
            None => false,
        }
    }
}

/// Token from `Authorization: Bearer ...`, falling back to `X-API-Key`.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        return Some(value.strip_prefix("Bearer ").unwrap_or(value).trim());
    }
    headers
        .get(X_API_KEY)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
}

pub async fn auth_middleware(
    State(auth): State<Arc<TokenAuth>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let token = extract_token(request.headers());
    if auth.validate(token) {
        return next.run(request).await;
    }

    if token.is_none() {
        tracing::warn!(path = %request.uri().path(), "No authentication token provided");
    } else {
        tracing::warn!(path = %request.uri().path(), "Invalid authentication token");
    }

    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Authentication required. Please provide a valid bearer token." })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_sources() {
        let auth = TokenAuth::from_sources(true, Some("main-key"), Some(" extra-1 , ,extra-2"));

        assert_eq!(auth.token_count(), 3);
        assert!(auth.validate(Some("main-key")));
        assert!(auth.validate(Some("extra-2")));
        assert!(!auth.validate(Some("other")));
        assert!(!auth.validate(None));
    }

    #[test]
    fn test_not_required_accepts_anything() {
        let auth = TokenAuth::from_sources(false, None, None);
        assert!(auth.validate(None));
        assert!(auth.validate(Some("whatever")));
    }

    #[test]
    fn test_extract_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert(X_API_KEY, HeaderValue::from_static("key-header"));
        assert_eq!(extract_token(&headers), Some("key-header"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer bearer-token"));
        assert_eq!(extract_token(&headers), Some("bearer-token"));
    }
}
