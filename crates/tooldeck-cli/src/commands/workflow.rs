//! `tooldeck workflow` — Run and validate workflow documents.

use std::time::Duration;

use serde_json::{Map, Value};
use tooldeck_core::workflow::{readiness, validate as preflight};
use tooldeck_core::{AppState, ExecuteOptions, ExecutionReport, WorkflowDocument};

use super::print_json;

/// Merge `--input-json` with `--input key=value` pairs (pairs win).
///
/// Pair values are kept as strings; parameter coercion converts them.
pub fn parse_inputs(pairs: &[String], json: Option<&str>) -> Result<Map<String, Value>, String> {
    let mut input = match json {
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err("--input-json must be a JSON object".to_string()),
            Err(e) => return Err(format!("Invalid --input-json: {}", e)),
        },
        None => Map::new(),
    };

    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("Invalid --input '{}': expected key=value", pair))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Invalid --input '{}': empty key", pair));
        }
        input.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(input)
}

pub async fn execute(
    state: &AppState,
    workflow_file: &str,
    input: Map<String, Value>,
    options: &ExecuteOptions,
) -> Result<ExecutionReport, String> {
    let document = WorkflowDocument::from_file(workflow_file).map_err(|e| e.to_string())?;
    state
        .executor
        .execute(&document, input, options)
        .await
        .map_err(|e| e.to_string())
}

/// Run a workflow and print its report. Fails when any action failed.
pub async fn run(
    state: &AppState,
    workflow_file: &str,
    input: Map<String, Value>,
    timeout_secs: Option<u64>,
    debug: bool,
) -> Result<(), String> {
    let options = ExecuteOptions {
        debug,
        timeout: timeout_secs.map(Duration::from_secs),
    };
    let report = execute(state, workflow_file, input, &options).await?;
    print_json(&serde_json::to_value(&report).map_err(|e| e.to_string())?);

    if report.success {
        Ok(())
    } else {
        let failed: Vec<&str> = report.errors.iter().map(|e| e.action_id.as_str()).collect();
        Err(format!("Workflow failed. Failed actions: {}", failed.join(", ")))
    }
}

/// Pre-flight a workflow file: `{status, missingTools, error?}`.
pub fn validate(state: &AppState, workflow_file: &str) -> Result<Value, String> {
    let document = WorkflowDocument::from_file(workflow_file).map_err(|e| e.to_string())?;
    let mut out = serde_json::to_value(readiness(&document, &state.registry))
        .map_err(|e| e.to_string())?;
    if out.get("missingTools").is_none() {
        out["missingTools"] = Value::Array(Vec::new());
    }
    if let Err(e) = preflight(&document, &state.registry) {
        out["error"] = Value::String(e.to_string());
    }
    Ok(out)
}

pub fn run_validate(state: &AppState, workflow_file: &str) -> Result<(), String> {
    let result = validate(state, workflow_file)?;
    print_json(&result);
    match result.get("error").and_then(Value::as_str) {
        Some(error) => Err(error.to_string()),
        None => {
            println!("Workflow '{}' is valid", workflow_file);
            Ok(())
        }
    }
}
