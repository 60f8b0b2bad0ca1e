//! Per-execution state: user input plus the results stored so far.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Created fresh for each `execute` call and dropped when it returns.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    pub user_input: Map<String, Value>,
    results: HashMap<String, Value>,
}

impl ExecutionContext {
    pub fn new(user_input: Map<String, Value>) -> Self {
        Self {
            user_input,
            results: HashMap::new(),
        }
    }

    pub fn store(&mut self, action_id: impl Into<String>, value: Value) {
        self.results.insert(action_id.into(), value);
    }

    pub fn result(&self, action_id: &str) -> Option<&Value> {
        self.results.get(action_id)
    }

    pub fn has_result(&self, action_id: &str) -> bool {
        self.results.contains_key(action_id)
    }
}
