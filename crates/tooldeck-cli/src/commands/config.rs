//! `tooldeck config` — Read and write config store entries.

use serde_json::Value;
use tooldeck_core::AppState;

use super::print_json;

pub async fn get(state: &AppState, key: &str) -> Result<Value, String> {
    state
        .config_store
        .get(key)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Config '{}' is not set", key))
}

/// Store `raw` parsed as JSON; text that is not valid JSON is stored as a string.
pub async fn set(state: &AppState, key: &str, raw: &str) -> Result<Value, String> {
    let value: Value =
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    state
        .config_store
        .set(key, value.clone())
        .await
        .map_err(|e| e.to_string())?;
    Ok(value)
}

pub async fn run_get(state: &AppState, key: &str) -> Result<(), String> {
    print_json(&get(state, key).await?);
    Ok(())
}

pub async fn run_set(state: &AppState, key: &str, raw: &str) -> Result<(), String> {
    let value = set(state, key, raw).await?;
    println!("Set {} = {}", key, value);
    Ok(())
}
