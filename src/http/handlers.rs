//! Route handlers.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::health::{DetailedReport, LivenessReport, ReadinessReport};
use crate::http::server::AppState;
use crate::tools::{ToolError, TOOL_NAMES};

fn probe_status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
}

/// `GET /health`
pub async fn liveness(State(state): State<AppState>) -> Json<LivenessReport> {
    Json(state.health.liveness())
}

/// `GET /ready`
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessReport>) {
    let report = state.health.readiness().await;
    (probe_status(report.status.http_status()), Json(report))
}

/// `GET /health/detailed`
pub async fn detailed(State(state): State<AppState>) -> (StatusCode, Json<DetailedReport>) {
    let report = state.health.detailed().await;
    (probe_status(report.status.http_status()), Json(report))
}

/// `GET /stats`
pub async fn stats(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "connection": state.manager.stats(),
        "retry": state.manager.retry_metrics().stats(),
    }))
}

/// `GET /tools`
pub async fn list_tools() -> Json<Value> {
    Json(json!({ "tools": TOOL_NAMES }))
}

/// `POST /tools/{name}`
pub async fn call_tool(State(state): State<AppState>, Path(name): Path<String>, body: Bytes) -> Response {
    let args = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(args) => args,
            Err(e) => {
                let err = ToolError::Arguments(format!("body is not valid JSON: {}", e));
                return (StatusCode::BAD_REQUEST, Json(err.to_json())).into_response();
            }
        }
    };

    match state.tools.call(&name, args).await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(err) => {
            let status = match &err {
                ToolError::Invalid(_) | ToolError::Arguments(_) => StatusCode::BAD_REQUEST,
                ToolError::UnknownTool(_) => StatusCode::NOT_FOUND,
                ToolError::Upstream(_) => StatusCode::BAD_GATEWAY,
            };
            tracing::debug!(tool = %name, status = status.as_u16(), error = %err, "Tool call failed");
            (status, Json(err.to_json())).into_response()
        }
    }
}
