//! Tool handlers exposed over HTTP.
//!
//! # Data Flow
//! ```text
//! POST /tools/{name} (JSON arguments)
//!     → Tools::call (parse arguments, dispatch)
//!     → argument validation (no network on failure)
//!     → API key resolution (keys.rs)
//!     → ConnectionManager::execute (retry + breaker)
//!     ← tool payload or {"error": "..."}
//! ```
//!
//! # Design Decisions
//! - Tool failures are values, never internal error types on the wire
//! - 4xx responses from upstream become readable messages per status

use std::sync::Arc;

use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::resilience::{ApiError, ApiResult};
use crate::upstream::{ConnectionManager, UpstreamRequest};

pub mod api_key;
pub mod factual;
pub mod keys;
pub mod query;

pub use keys::{mask_key, ApiKeyStore};

pub const QUERY_PATH: &str = "/v2/query";
pub const CORRECT_HALLUCINATIONS_PATH: &str = "/v2/hallucination_correctors/correct_hallucinations";
pub const FACTUAL_CONSISTENCY_PATH: &str = "/v2/evaluate_factual_consistency";

pub const TOOL_NAMES: [&str; 6] = [
    "ask_vectara",
    "search_vectara",
    "correct_hallucinations",
    "eval_factual_consistency",
    "setup_vectara_api_key",
    "clear_vectara_api_key",
];

const API_KEY_MISSING: &str = "API key not configured. Please use 'setup_vectara_api_key' tool first or set VECTARA_API_KEY environment variable.";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    /// Rejected before any network attempt.
    #[error("{0}")]
    Invalid(String),

    /// Upstream call failed; message carries the tool's context prefix.
    #[error("{0}")]
    Upstream(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    Arguments(String),
}

impl ToolError {
    pub fn to_json(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

pub type ToolResult = Result<Value, ToolError>;

/// Dispatches tool calls against the upstream API.
pub struct Tools {
    manager: Arc<ConnectionManager>,
    keys: ApiKeyStore,
}

impl Tools {
    pub fn new(manager: Arc<ConnectionManager>, keys: ApiKeyStore) -> Self {
        Self { manager, keys }
    }

    pub fn keys(&self) -> &ApiKeyStore {
        &self.keys
    }

    /// Run the named tool with JSON arguments.
    pub async fn call(&self, name: &str, args: Value) -> ToolResult {
        match name {
            "ask_vectara" => self.ask_vectara(parse_args(args)?).await,
            "search_vectara" => self.search_vectara(parse_args(args)?).await,
            "correct_hallucinations" => self.correct_hallucinations(parse_args(args)?).await,
            "eval_factual_consistency" => self.eval_factual_consistency(parse_args(args)?).await,
            "setup_vectara_api_key" => self.setup_vectara_api_key(parse_args(args)?).await,
            "clear_vectara_api_key" => Ok(self.clear_vectara_api_key()),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    fn require_key(&self, explicit: Option<&str>) -> Result<String, ToolError> {
        self.keys
            .resolve(explicit)
            .ok_or_else(|| ToolError::Invalid(API_KEY_MISSING.to_string()))
    }

    /// POST a JSON body with the API key header. 4xx responses come back as `Ok`.
    async fn send<B: Serialize>(&self, path: &str, api_key: &str, body: &B) -> ApiResult<Response> {
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| ApiError::Config("API key contains invalid header characters".to_string()))?;
        key.set_sensitive(true);

        let req = UpstreamRequest::post(self.manager.url(path))
            .header(HeaderName::from_static("x-api-key"), key)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(serde_json::to_value(body)?);

        self.manager.execute(req).await
    }

    /// POST and decode a successful JSON reply. Failures become messages.
    ///
    /// `denied` completes the 403 message ("Permissions do not allow ...").
    async fn post_json<B: Serialize>(&self, path: &str, api_key: &str, body: &B, denied: &str) -> Result<Value, String> {
        let response = self.send(path, api_key, body).await.map_err(|e| e.to_string())?;
        let status = response.status();

        if status.is_success() {
            return response
                .json::<Value>()
                .await
                .map_err(|e| ApiError::from(e).to_string());
        }

        let body = response.text().await.unwrap_or_default();
        Err(describe_status(status.as_u16(), &body, denied))
    }
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| ToolError::Arguments(e.to_string()))
}

/// Readable message for an upstream client-error status.
pub fn describe_status(status: u16, body: &str, denied: &str) -> String {
    match status {
        400 => format!("Bad request: {}", body),
        401 => "API key error".to_string(),
        403 => format!("Permissions do not allow {}.", denied),
        404 => format!("Not found: {}", body),
        422 => "Language not supported by service.".to_string(),
        _ => format!("API error {}: {}", status, body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    pub(crate) fn tools(configured_key: Option<&str>) -> Tools {
        let mut config = ServerConfig::default();
        config.upstream.base_url = "http://127.0.0.1:9".to_string();
        Tools::new(
            Arc::new(ConnectionManager::new(&config)),
            ApiKeyStore::new(configured_key.map(str::to_string)),
        )
    }

    #[test]
    fn test_describe_status() {
        assert_eq!(describe_status(400, "Invalid request format", "x"), "Bad request: Invalid request format");
        assert_eq!(describe_status(401, "", "x"), "API key error");
        assert_eq!(
            describe_status(403, "", "hallucination correction"),
            "Permissions do not allow hallucination correction."
        );
        assert_eq!(describe_status(404, "corpus", "x"), "Not found: corpus");
        assert_eq!(describe_status(422, "", "x"), "Language not supported by service.");
        assert_eq!(describe_status(409, "conflict", "x"), "API error 409: conflict");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = tools(None).call("delete_everything", json!({})).await.unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("delete_everything".to_string()));
        assert_eq!(err.to_json(), json!({"error": "Unknown tool: delete_everything"}));
    }

    #[tokio::test]
    async fn test_bad_argument_types() {
        let err = tools(None)
            .call("ask_vectara", json!({"query": 42}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Arguments(_)));
    }

    #[tokio::test]
    async fn test_missing_api_key_message() {
        let err = tools(None)
            .call("ask_vectara", json!({"query": "q", "corpus_keys": ["c"]}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), API_KEY_MISSING);
    }
}
