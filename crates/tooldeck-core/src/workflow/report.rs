//! Execution report returned to the caller after every action was attempted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorKind, ExecutionError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub action_id: String,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionError {
    pub action_id: String,
    pub error: String,
    pub kind: ErrorKind,
}

impl ActionError {
    pub fn new(action_id: impl Into<String>, err: &ExecutionError) -> Self {
        Self {
            action_id: action_id.into(),
            error: err.to_string(),
            kind: err.kind(),
        }
    }
}

/// `{success, results, errors}` — each action id appears in exactly one list,
/// in execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub success: bool,
    pub results: Vec<ActionResult>,
    pub errors: Vec<ActionError>,
}

impl ExecutionReport {
    pub(crate) fn record_success(&mut self, action_id: &str, result: Value) {
        self.results.push(ActionResult {
            action_id: action_id.to_string(),
            result,
        });
    }

    pub(crate) fn record_failure(&mut self, action_id: &str, err: &ExecutionError) {
        self.errors.push(ActionError::new(action_id, err));
    }

    pub(crate) fn finish(mut self) -> Self {
        self.success = self.errors.is_empty();
        self
    }

    pub fn result(&self, action_id: &str) -> Option<&Value> {
        self.results
            .iter()
            .find(|r| r.action_id == action_id)
            .map(|r| &r.result)
    }

    pub fn error(&self, action_id: &str) -> Option<&ActionError> {
        self.errors.iter().find(|e| e.action_id == action_id)
    }
}
