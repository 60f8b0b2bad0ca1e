use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use tooldeck_core::{AppState, ServerError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_config))
        .route("/{key}", get(get_config).put(set_config).delete(delete_config))
}

async fn list_config(State(state): State<AppState>) -> Result<Json<Value>, ServerError> {
    let entries = state.config_store.list().await?;
    Ok(Json(serde_json::json!({ "entries": entries })))
}

async fn get_config(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ServerError> {
    match state.config_store.get(&key).await? {
        Some(value) => Ok(Json(serde_json::json!({ "key": key, "value": value }))),
        None => Err(ServerError::NotFound(format!("Config {} not found", key))),
    }
}

#[derive(Debug, Deserialize)]
struct SetConfigRequest {
    value: Value,
}

async fn set_config(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<SetConfigRequest>,
) -> Result<Json<Value>, ServerError> {
    state.config_store.set(&key, body.value.clone()).await?;
    Ok(Json(serde_json::json!({ "key": key, "value": body.value })))
}

async fn delete_config(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let deleted = state.config_store.delete(&key).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}
