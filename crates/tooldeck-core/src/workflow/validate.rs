//! Pre-flight checks run before any action executes.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::ValidationError;
use crate::registry::FunctionRegistry;
use crate::workflow::reference::{placeholder_references, ParamExpr};
use crate::workflow::schema::WorkflowDocument;

/// Whether a document can run against a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum WorkflowStatus {
    Ready,
    Disabled {
        #[serde(rename = "missingTools")]
        missing_tools: Vec<String>,
    },
}

/// Tools the document names that are not registered, in first-use order.
pub fn missing_tools(document: &WorkflowDocument, registry: &FunctionRegistry) -> Vec<String> {
    let mut seen = HashSet::new();
    document
        .actions
        .iter()
        .filter(|a| !registry.contains(&a.tool))
        .filter(|a| seen.insert(a.tool.clone()))
        .map(|a| a.tool.clone())
        .collect()
}

pub fn readiness(document: &WorkflowDocument, registry: &FunctionRegistry) -> WorkflowStatus {
    let missing = missing_tools(document, registry);
    if missing.is_empty() {
        WorkflowStatus::Ready
    } else {
        WorkflowStatus::Disabled {
            missing_tools: missing,
        }
    }
}

/// Structural and registry checks.
///
/// References to an action declared later (or to the action itself) are
/// rejected here, including `{{placeholders}}` in generation and transform
/// prompts. References to ids that are not declared at all are left to
/// fail at run time as unresolved references.
pub fn validate(document: &WorkflowDocument, registry: &FunctionRegistry) -> Result<(), ValidationError> {
    if document.actions.is_empty() {
        return Err(ValidationError::EmptyWorkflow);
    }

    let declared: HashSet<&str> = document.actions.iter().map(|a| a.id.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    for action in &document.actions {
        if !seen.insert(action.id.as_str()) {
            return Err(ValidationError::DuplicateActionId(action.id.clone()));
        }
    }

    let missing = missing_tools(document, registry);
    if !missing.is_empty() {
        return Err(ValidationError::UnknownTool(missing));
    }

    let mut earlier: HashSet<&str> = HashSet::new();
    for action in &document.actions {
        let mut references = Vec::new();
        for raw in action.parameters.values() {
            match ParamExpr::parse(raw) {
                ParamExpr::Reference(reference) => references.push(reference),
                ParamExpr::Generate { prompt, .. } => {
                    references.extend(placeholder_references(&prompt))
                }
                ParamExpr::Literal(_) => {}
            }
        }
        if let Some(directive) = &action.transform {
            references.extend(placeholder_references(directive.prompt()));
        }

        for reference in references {
            if let Some(target) = reference.action_id() {
                if declared.contains(target) && !earlier.contains(target) {
                    return Err(ValidationError::ForwardReference {
                        action: action.id.clone(),
                        reference: reference.to_string(),
                    });
                }
            }
        }
        earlier.insert(action.id.as_str());
    }

    Ok(())
}
