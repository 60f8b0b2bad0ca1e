use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use tooldeck_core::{AppState, ServerError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_functions))
        .route("/{name}", get(get_function))
        .route("/{name}/invoke", post(invoke_function))
}

async fn list_functions(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::json!({ "functions": state.registry.describe_all() }))
}

async fn get_function(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ServerError> {
    state
        .registry
        .describe(&name)
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Function {} not found", name)))
}

#[derive(Debug, Default, Deserialize)]
struct InvokeRequest {
    #[serde(default)]
    args: Map<String, Value>,
}

/// POST /functions/{name}/invoke — call failures are reported in the body
async fn invoke_function(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<InvokeRequest>,
) -> Json<Value> {
    match state.registry.invoke(&name, &body.args).await {
        Ok(result) => Json(serde_json::json!({ "result": result })),
        Err(e) => {
            tracing::warn!("Invocation of {} failed: {}", name, e);
            Json(serde_json::json!({ "error": e.to_string(), "kind": e.kind() }))
        }
    }
}
