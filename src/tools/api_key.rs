//! `setup_vectara_api_key` and `clear_vectara_api_key`.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::{mask_key, ToolError, ToolResult, Tools, QUERY_PATH};

/// Corpus used to validate a key. A 404 for it still proves the key works.
const VALIDATION_CORPUS: &str = "vectara-mcp-key-validation";

#[derive(Debug, Clone, Deserialize)]
pub struct SetupKeyParams {
    #[serde(default)]
    pub api_key: String,
}

impl Tools {
    /// Validate a key against upstream, then keep it in memory.
    pub async fn setup_vectara_api_key(&self, params: SetupKeyParams) -> ToolResult {
        if params.api_key.is_empty() {
            return Err(ToolError::Invalid("API key is required.".to_string()));
        }

        tracing::info!(key = %mask_key(&params.api_key), "Validating Vectara API key");

        let probe = json!({
            "query": "test",
            "search": { "corpora": [{ "corpus_key": VALIDATION_CORPUS }], "limit": 1 },
        });

        match self.send(QUERY_PATH, &params.api_key, &probe).await {
            Ok(response) if response.status() == StatusCode::UNAUTHORIZED => Err(ToolError::Invalid(
                "Invalid API key. Please check your Vectara API key and try again.".to_string(),
            )),
            Ok(_) => {
                let masked = mask_key(&params.api_key);
                self.keys().set(params.api_key);
                Ok(json!({ "message": format!("API key configured successfully: {}", masked) }))
            }
            Err(err) => Err(ToolError::Upstream(format!("API validation failed: {}", err))),
        }
    }

    pub fn clear_vectara_api_key(&self) -> Value {
        tracing::info!("Clearing stored Vectara API key");
        self.keys().clear();
        json!({ "message": "API key cleared from server memory." })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::tools;

    #[tokio::test]
    async fn test_setup_requires_key() {
        let err = tools(None)
            .call("setup_vectara_api_key", json!({"api_key": ""}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "API key is required.");
    }

    #[tokio::test]
    async fn test_clear() {
        let tools = tools(None);
        tools.keys().set("test-key");

        let out = tools.call("clear_vectara_api_key", Value::Null).await.unwrap();
        assert_eq!(out["message"], "API key cleared from server memory.");
        assert_eq!(tools.keys().stored(), None);
    }
}
