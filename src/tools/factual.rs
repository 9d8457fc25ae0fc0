//! Hallucination correction and factual consistency evaluation.

use serde::{Deserialize, Serialize};

use crate::tools::{ToolError, ToolResult, Tools, CORRECT_HALLUCINATIONS_PATH, FACTUAL_CONSISTENCY_PATH};

const CORRECTION_MODEL: &str = "vhc-large-1.0";

#[derive(Debug, Clone, Deserialize)]
pub struct CorrectionParams {
    #[serde(default)]
    pub generated_text: String,
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsistencyParams {
    #[serde(default)]
    pub generated_text: String,
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct CorrectionBody<'a> {
    generated_text: &'a str,
    documents: Vec<DocumentText<'a>>,
    model_name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DocumentText<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct ConsistencyBody<'a> {
    generated_text: &'a str,
    source_texts: &'a [String],
}

fn validate(generated_text: &str, documents: &[String]) -> Result<(), ToolError> {
    if generated_text.is_empty() {
        return Err(ToolError::Invalid("Generated text is required.".to_string()));
    }
    if documents.is_empty() {
        return Err(ToolError::Invalid("Documents are required.".to_string()));
    }
    Ok(())
}

impl Tools {
    pub async fn correct_hallucinations(&self, params: CorrectionParams) -> ToolResult {
        validate(&params.generated_text, &params.documents)?;
        let api_key = self.require_key(params.api_key.as_deref())?;

        tracing::info!(documents = params.documents.len(), "Running hallucination correction");

        let body = CorrectionBody {
            generated_text: &params.generated_text,
            documents: params.documents.iter().map(|text| DocumentText { text }).collect(),
            model_name: CORRECTION_MODEL,
            query: params.query.as_deref().filter(|q| !q.is_empty()),
        };

        self.post_json(CORRECT_HALLUCINATIONS_PATH, &api_key, &body, "hallucination correction")
            .await
            .map_err(|msg| ToolError::Upstream(format!("Error with hallucination correction: {}", msg)))
    }

    pub async fn eval_factual_consistency(&self, params: ConsistencyParams) -> ToolResult {
        validate(&params.generated_text, &params.documents)?;
        let api_key = self.require_key(params.api_key.as_deref())?;

        tracing::info!(documents = params.documents.len(), "Running factual consistency evaluation");

        let body = ConsistencyBody {
            generated_text: &params.generated_text,
            source_texts: &params.documents,
        };

        self.post_json(FACTUAL_CONSISTENCY_PATH, &api_key, &body, "factual consistency evaluation")
            .await
            .map_err(|msg| ToolError::Upstream(format!("Error with factual consistency evaluation: {}", msg)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::tools;
    use serde_json::json;

    #[tokio::test]
    async fn test_correction_requires_text() {
        let err = tools(Some("key"))
            .call("correct_hallucinations", json!({"documents": ["doc"]}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Generated text is required.");
    }

    #[tokio::test]
    async fn test_consistency_requires_documents() {
        let err = tools(Some("key"))
            .call("eval_factual_consistency", json!({"generated_text": "text"}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Documents are required.");
    }

    #[test]
    fn test_correction_body_shape() {
        let docs = vec!["source one".to_string()];
        let body = CorrectionBody {
            generated_text: "text",
            documents: docs.iter().map(|text| DocumentText { text }).collect(),
            model_name: CORRECTION_MODEL,
            query: None,
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["documents"][0]["text"], "source one");
        assert_eq!(json["model_name"], "vhc-large-1.0");
        assert!(json.get("query").is_none());
    }
}
