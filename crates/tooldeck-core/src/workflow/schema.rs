//! Workflow document model — the declarative plan the executor runs.
//!
//! Documents arrive as JSON (from the planner or the HTTP API) or YAML
//! (from files on disk):
//!
//! ```json
//! {
//!   "type": "workflow",
//!   "description": "Email every customer in the upload",
//!   "actions": [
//!     { "id": "rows", "tool": "parse_csv", "parameters": { "csv": "userInput.file" } },
//!     {
//!       "id": "send",
//!       "tool": "send_email",
//!       "map": true,
//!       "parameters": {
//!         "to": "rows[*].email",
//!         "body": { "_generate": "Write a short welcome note", "_context": "markdown" }
//!       },
//!       "_transform": { "_transform": "Summarise delivery status", "_context": "markdown" }
//!     }
//!   ]
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::registry::ParamType;

/// Marker for the document's `type` field; only `"workflow"` is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    #[default]
    Workflow,
}

/// Top-level workflow document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    #[serde(rename = "type", default)]
    pub doc_type: DocumentType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Ordered actions; references may only point backwards
    pub actions: Vec<Action>,

    /// Input/output component metadata for the presentation layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<Value>,
}

/// Output format hint for generation and transform calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationContext {
    Sql,
    Markdown,
    Json,
    #[default]
    General,
}

impl GenerationContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationContext::Sql => "sql",
            GenerationContext::Markdown => "markdown",
            GenerationContext::Json => "json",
            GenerationContext::General => "general",
        }
    }
}

/// `_transform` directive: a bare prompt or `{_transform, _context}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransformDirective {
    Prompt(String),
    Detailed {
        #[serde(rename = "_transform")]
        prompt: String,
        #[serde(rename = "_context", default)]
        context: GenerationContext,
    },
}

impl TransformDirective {
    pub fn prompt(&self) -> &str {
        match self {
            TransformDirective::Prompt(p) => p,
            TransformDirective::Detailed { prompt, .. } => prompt,
        }
    }

    pub fn context(&self) -> GenerationContext {
        match self {
            TransformDirective::Prompt(_) => GenerationContext::General,
            TransformDirective::Detailed { context, .. } => *context,
        }
    }
}

/// UI/coercion hint for one parameter. Not enforced at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterHint {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub param_type: Option<ParamType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

/// One step of a workflow, invoking exactly one registered function.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Unique key other actions use to reference this result
    pub id: String,

    /// Registered function name
    pub tool: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Parameter name → literal, reference expression, or directive object
    #[serde(default)]
    pub parameters: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_metadata: Option<HashMap<String, ParameterHint>>,

    /// Run once per element of the array-valued parameters
    #[serde(default)]
    pub map: bool,

    #[serde(rename = "_transform", default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformDirective>,
}

impl WorkflowDocument {
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::Malformed(format!("invalid workflow JSON: {}", e)))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ValidationError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| ValidationError::Malformed(format!("invalid workflow YAML: {}", e)))
    }

    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        serde_json::from_value(value)
            .map_err(|e| ValidationError::Malformed(format!("invalid workflow document: {}", e)))
    }

    /// Load a document from disk; `.yaml`/`.yml` are parsed as YAML, anything else as JSON.
    pub fn from_file(path: &str) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::Malformed(format!("failed to read workflow file '{}': {}", path, e))
        })?;
        if path.ends_with(".yaml") || path.ends_with(".yml") {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    pub fn action(&self, id: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json_document() {
        let doc = WorkflowDocument::from_value(json!({
            "type": "workflow",
            "description": "Send reports",
            "actions": [
                {
                    "id": "rows",
                    "tool": "load_rows",
                    "parameters": { "limit": 10, "table": "userInput.table" }
                },
                {
                    "id": "send",
                    "tool": "send_email",
                    "map": true,
                    "parameters": {
                        "to": "rows[*].email",
                        "body": { "_generate": "Write a note", "_context": "markdown" }
                    },
                    "parameterMetadata": {
                        "to": { "type": "string", "required": true }
                    },
                    "_transform": { "_transform": "Summarise", "_context": "json" }
                }
            ],
            "ui": { "inputs": [] }
        }))
        .unwrap();

        assert_eq!(doc.actions.len(), 2);
        let send = doc.action("send").unwrap();
        assert!(send.map);
        assert_eq!(
            send.transform,
            Some(TransformDirective::Detailed {
                prompt: "Summarise".into(),
                context: GenerationContext::Json
            })
        );
        let keys: Vec<&String> = send.parameters.keys().collect();
        assert_eq!(keys, vec!["to", "body"]);
        assert_eq!(
            send.parameter_metadata.as_ref().unwrap()["to"].param_type,
            Some(ParamType::String)
        );
        assert!(!doc.actions[0].map);
    }

    #[test]
    fn test_parse_yaml_with_bare_transform() {
        let yaml = r#"
type: workflow
actions:
  - id: sum
    tool: add
    parameters:
      a: 1
      b: "2"
    _transform: "Describe the number"
"#;
        let doc = WorkflowDocument::from_yaml(yaml).unwrap();
        let transform = doc.actions[0].transform.as_ref().unwrap();
        assert_eq!(transform.prompt(), "Describe the number");
        assert_eq!(transform.context(), GenerationContext::General);
    }

    #[test]
    fn test_wrong_type_marker_is_malformed() {
        let err = WorkflowDocument::from_value(json!({ "type": "chat", "actions": [] })).unwrap_err();
        assert!(matches!(err, ValidationError::Malformed(_)));
    }
}
