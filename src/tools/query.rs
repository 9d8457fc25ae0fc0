//! `ask_vectara` (RAG query with generation) and `search_vectara` (retrieval only).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::tools::{ToolError, ToolResult, Tools, QUERY_PATH};

const RERANKER_ID: &str = "rnk_272725719";
const DEFAULT_PRESET: &str = "vectara-summary-table-md-query-ext-jan-2025-gpt-4o";
const QUERY_DENIED: &str = "querying the requested corpora";

fn default_sentences() -> u32 {
    2
}

fn default_lexical_interpolation() -> f64 {
    0.005
}

fn default_max_used_search_results() -> u32 {
    10
}

fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}

fn default_language() -> String {
    "eng".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AskParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub corpus_keys: Vec<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_sentences")]
    pub n_sentences_before: u32,
    #[serde(default = "default_sentences")]
    pub n_sentences_after: u32,
    #[serde(default = "default_lexical_interpolation")]
    pub lexical_interpolation: f64,
    #[serde(default = "default_max_used_search_results")]
    pub max_used_search_results: u32,
    #[serde(default = "default_preset")]
    pub generation_preset_name: String,
    #[serde(default = "default_language")]
    pub response_language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub corpus_keys: Vec<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_sentences")]
    pub n_sentences_before: u32,
    #[serde(default = "default_sentences")]
    pub n_sentences_after: u32,
    #[serde(default = "default_lexical_interpolation")]
    pub lexical_interpolation: f64,
}

// Request body for /v2/query.

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    query: &'a str,
    search: SearchSpec<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation: Option<GenerationSpec<'a>>,
    save_history: bool,
}

#[derive(Debug, Serialize)]
struct SearchSpec<'a> {
    corpora: Vec<CorpusSpec<'a>>,
    context_configuration: ContextSpec,
    reranker: RerankerSpec,
}

#[derive(Debug, Serialize)]
struct CorpusSpec<'a> {
    corpus_key: &'a str,
    lexical_interpolation: f64,
}

#[derive(Debug, Serialize)]
struct ContextSpec {
    sentences_before: u32,
    sentences_after: u32,
}

#[derive(Debug, Serialize)]
struct RerankerSpec {
    #[serde(rename = "type")]
    kind: &'static str,
    reranker_id: &'static str,
    limit: u32,
    cutoff: f64,
}

#[derive(Debug, Serialize)]
struct GenerationSpec<'a> {
    generation_preset_name: &'a str,
    max_used_search_results: u32,
    response_language: &'a str,
    citations: CitationSpec,
    enable_factual_consistency_score: bool,
}

#[derive(Debug, Serialize)]
struct CitationSpec {
    style: &'static str,
    url_pattern: &'static str,
}

fn search_spec(corpus_keys: &[String], before: u32, after: u32, lexical_interpolation: f64) -> SearchSpec<'_> {
    SearchSpec {
        corpora: corpus_keys
            .iter()
            .map(|key| CorpusSpec {
                corpus_key: key,
                lexical_interpolation,
            })
            .collect(),
        context_configuration: ContextSpec {
            sentences_before: before,
            sentences_after: after,
        },
        reranker: RerankerSpec {
            kind: "customer_reranker",
            reranker_id: RERANKER_ID,
            limit: 100,
            cutoff: 0.1,
        },
    }
}

// Response from /v2/query; unknown fields are ignored.

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    search_results: Vec<SearchResult>,
    #[serde(default)]
    factual_consistency_score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchResult {
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub document_metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

fn validate_query(query: &str, corpus_keys: &[String]) -> Result<(), ToolError> {
    if query.is_empty() {
        return Err(ToolError::Invalid("Query is required.".to_string()));
    }
    if corpus_keys.is_empty() {
        return Err(ToolError::Invalid(
            "Corpus keys are required. Please ask the user to provide one or more corpus keys.".to_string(),
        ));
    }
    Ok(())
}

fn decode(value: Value, context: &str) -> Result<QueryResponse, ToolError> {
    serde_json::from_value(value)
        .map_err(|e| ToolError::Upstream(format!("{}: unexpected response: {}", context, e)))
}

impl Tools {
    pub async fn ask_vectara(&self, params: AskParams) -> ToolResult {
        const CONTEXT: &str = "Error with Vectara RAG query";

        validate_query(&params.query, &params.corpus_keys)?;
        let api_key = self.require_key(params.api_key.as_deref())?;

        tracing::info!(query = %params.query, corpora = params.corpus_keys.len(), "Running Vectara RAG query");

        let body = QueryBody {
            query: &params.query,
            search: search_spec(
                &params.corpus_keys,
                params.n_sentences_before,
                params.n_sentences_after,
                params.lexical_interpolation,
            ),
            generation: Some(GenerationSpec {
                generation_preset_name: &params.generation_preset_name,
                max_used_search_results: params.max_used_search_results,
                response_language: &params.response_language,
                citations: CitationSpec {
                    style: "markdown",
                    url_pattern: "{doc.url}",
                },
                enable_factual_consistency_score: true,
            }),
            save_history: true,
        };

        let value = self
            .post_json(QUERY_PATH, &api_key, &body, QUERY_DENIED)
            .await
            .map_err(|msg| ToolError::Upstream(format!("{}: {}", CONTEXT, msg)))?;
        let response = decode(value, CONTEXT)?;

        let citations: Vec<Value> = response
            .search_results
            .iter()
            .enumerate()
            .map(|(i, result)| {
                json!({
                    "id": i + 1,
                    "score": result.score,
                    "text": result.text,
                    "document_metadata": result.document_metadata,
                })
            })
            .collect();

        let mut out = json!({
            "summary": response.summary.unwrap_or_default(),
            "citations": citations,
        });
        if let Some(score) = response.factual_consistency_score {
            out["factual_consistency_score"] = json!(score);
        }
        Ok(out)
    }

    pub async fn search_vectara(&self, params: SearchParams) -> ToolResult {
        const CONTEXT: &str = "Error with Vectara semantic search query";

        validate_query(&params.query, &params.corpus_keys)?;
        let api_key = self.require_key(params.api_key.as_deref())?;

        tracing::info!(query = %params.query, corpora = params.corpus_keys.len(), "Running Vectara semantic search query");

        let body = QueryBody {
            query: &params.query,
            search: search_spec(
                &params.corpus_keys,
                params.n_sentences_before,
                params.n_sentences_after,
                params.lexical_interpolation,
            ),
            generation: None,
            save_history: true,
        };

        let value = self
            .post_json(QUERY_PATH, &api_key, &body, QUERY_DENIED)
            .await
            .map_err(|msg| ToolError::Upstream(format!("{}: {}", CONTEXT, msg)))?;
        let response = decode(value, CONTEXT)?;

        Ok(json!({ "search_results": response.search_results }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::tools;

    #[tokio::test]
    async fn test_ask_requires_query() {
        let err = tools(Some("key"))
            .call("ask_vectara", json!({"corpus_keys": ["c"]}))
            .await
            .unwrap_err();
        assert_eq!(err.to_json(), json!({"error": "Query is required."}));
    }

    #[tokio::test]
    async fn test_search_requires_corpus_keys() {
        let err = tools(Some("key"))
            .call("search_vectara", json!({"query": "q"}))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Corpus keys are required. Please ask the user to provide one or more corpus keys."
        );
    }

    #[test]
    fn test_defaults() {
        let params: AskParams = serde_json::from_value(json!({"query": "q"})).unwrap();
        assert_eq!(params.n_sentences_before, 2);
        assert_eq!(params.lexical_interpolation, 0.005);
        assert_eq!(params.max_used_search_results, 10);
        assert_eq!(params.generation_preset_name, DEFAULT_PRESET);
        assert_eq!(params.response_language, "eng");
    }

    #[test]
    fn test_query_body_shape() {
        let keys = vec!["corpus-a".to_string(), "corpus-b".to_string()];
        let body = QueryBody {
            query: "what is rust",
            search: search_spec(&keys, 2, 3, 0.005),
            generation: None,
            save_history: true,
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["search"]["corpora"][1]["corpus_key"], "corpus-b");
        assert_eq!(json["search"]["context_configuration"]["sentences_after"], 3);
        assert_eq!(json["search"]["reranker"]["type"], "customer_reranker");
        assert!(json.get("generation").is_none());
    }
}
