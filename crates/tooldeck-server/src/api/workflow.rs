use std::time::Duration;

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{Map, Value};

use tooldeck_core::workflow::{readiness, validate, WorkflowStatus};
use tooldeck_core::{AppState, ExecuteOptions, ExecutionReport, ServerError, WorkflowDocument};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/execute", post(execute_workflow))
        .route("/validate", post(validate_workflow))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest {
    workflow: Value,
    #[serde(default)]
    user_input: Map<String, Value>,
    #[serde(default)]
    debug: bool,
    timeout_ms: Option<u64>,
}

async fn execute_workflow(
    State(state): State<AppState>,
    Json(body): Json<ExecuteRequest>,
) -> Result<Json<ExecutionReport>, ServerError> {
    let document = WorkflowDocument::from_value(body.workflow)?;
    let options = ExecuteOptions {
        debug: body.debug,
        timeout: body.timeout_ms.map(Duration::from_millis),
    };
    let report = state
        .executor
        .execute(&document, body.user_input, &options)
        .await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
struct ValidateRequest {
    workflow: Value,
}

/// POST /workflow/validate — readiness plus the first structural error, if any
async fn validate_workflow(
    State(state): State<AppState>,
    Json(body): Json<ValidateRequest>,
) -> Result<Json<Value>, ServerError> {
    let document = WorkflowDocument::from_value(body.workflow)?;

    let missing_tools = match readiness(&document, &state.registry) {
        WorkflowStatus::Ready => Vec::new(),
        WorkflowStatus::Disabled { missing_tools } => missing_tools,
    };
    let status = if missing_tools.is_empty() { "ready" } else { "disabled" };

    let mut out = serde_json::json!({
        "status": status,
        "missingTools": missing_tools,
    });
    if let Err(e) = validate(&document, &state.registry) {
        out["error"] = Value::String(e.to_string());
    }
    Ok(Json(out))
}
