//! Workflow Executor — runs a workflow document action by action.
//!
//! The executor:
//! 1. Validates the document against the registry (pre-flight)
//! 2. Resolves each action's parameters from user input and earlier results
//! 3. Invokes the function once, or once per element for `map` actions
//! 4. Applies the optional `_transform` and stores the result under the action id
//! 5. Records failures per action and keeps going
//!
//! Actions run strictly in document order. A failed action stores no result,
//! so anything referencing it fails with `UnresolvedReference`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::Instrument;

use crate::error::{ExecutionError, ValidationError};
use crate::registry::FunctionRegistry;
use crate::workflow::context::ExecutionContext;
use crate::workflow::generator::{normalize_output, DisabledGenerator, Generator};
use crate::workflow::reference::{interpolate, ParamExpr};
use crate::workflow::report::ExecutionReport;
use crate::workflow::schema::{Action, WorkflowDocument};
use crate::workflow::validate::validate;

/// Per-call execution options.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Log resolved arguments and outcomes at info level
    pub debug: bool,
    /// Deadline for the whole run
    pub timeout: Option<Duration>,
}

/// The workflow executor engine.
#[derive(Clone)]
pub struct WorkflowExecutor {
    registry: Arc<FunctionRegistry>,
    generator: Arc<dyn Generator>,
}

impl WorkflowExecutor {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self {
            registry,
            generator: Arc::new(DisabledGenerator),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    /// Execute a workflow document.
    ///
    /// Returns `Err` only for pre-flight failures; every runtime failure is
    /// recorded in the report.
    pub async fn execute(
        &self,
        document: &WorkflowDocument,
        user_input: Map<String, Value>,
        options: &ExecuteOptions,
    ) -> Result<ExecutionReport, ValidationError> {
        validate(document, &self.registry)?;

        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("workflow", run_id = %run_id, actions = document.actions.len());
        Ok(self.run(document, user_input, options).instrument(span).await)
    }

    async fn run(
        &self,
        document: &WorkflowDocument,
        user_input: Map<String, Value>,
        options: &ExecuteOptions,
    ) -> ExecutionReport {
        let deadline = options.timeout.map(|t| tokio::time::Instant::now() + t);
        let mut ctx = ExecutionContext::new(user_input);
        let mut report = ExecutionReport::default();

        for (i, action) in document.actions.iter().enumerate() {
            let outcome = match deadline {
                Some(deadline) => {
                    if tokio::time::Instant::now() >= deadline {
                        abort_remaining(&mut report, &document.actions[i..], "execution deadline exceeded before start");
                        break;
                    }
                    match tokio::time::timeout_at(deadline, self.run_action(action, &ctx, options)).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            tracing::warn!("[Workflow] Action '{}' aborted: deadline exceeded", action.id);
                            report.record_failure(
                                &action.id,
                                &ExecutionError::ExecutionAborted("execution deadline exceeded".to_string()),
                            );
                            abort_remaining(&mut report, &document.actions[i + 1..], "execution deadline exceeded before start");
                            break;
                        }
                    }
                }
                None => self.run_action(action, &ctx, options).await,
            };

            match outcome {
                Ok(value) => {
                    if options.debug {
                        tracing::info!("[Workflow] {} ({}) succeeded: {}", action.id, action.tool, value);
                    } else {
                        tracing::info!("[Workflow] {} ({}) succeeded", action.id, action.tool);
                    }
                    ctx.store(action.id.clone(), value.clone());
                    report.record_success(&action.id, value);
                }
                Err(err) => {
                    tracing::warn!("[Workflow] {} ({}) failed: {}", action.id, action.tool, err);
                    report.record_failure(&action.id, &err);
                }
            }
        }

        let report = report.finish();
        tracing::info!(
            "[Workflow] Complete: {}/{} actions succeeded",
            report.results.len(),
            document.actions.len()
        );
        report
    }

    /// Resolve, invoke and transform a single action.
    async fn run_action(
        &self,
        action: &Action,
        ctx: &ExecutionContext,
        options: &ExecuteOptions,
    ) -> Result<Value, ExecutionError> {
        let resolved = self.resolve_parameters(action, ctx).await?;
        if options.debug {
            let shown = Value::Object(resolved.clone());
            tracing::info!("[Workflow] {} resolved arguments: {}", action.id, shown);
        } else {
            tracing::debug!("[Workflow] {} resolved arguments: {:?}", action.id, resolved);
        }

        let raw = if action.map {
            self.invoke_mapped(action, &resolved).await?
        } else {
            self.registry.invoke(&action.tool, &resolved).await?
        };

        match &action.transform {
            Some(directive) => {
                let prompt = interpolate(directive.prompt(), ctx)?;
                let transformed = self
                    .generator
                    .transform(&raw, &prompt, directive.context())
                    .await
                    .map_err(ExecutionError::GenerationFailed)?;
                normalize_output(transformed, directive.context())
            }
            None => Ok(raw),
        }
    }

    /// Turn raw parameters into concrete values; absent values are omitted.
    async fn resolve_parameters(
        &self,
        action: &Action,
        ctx: &ExecutionContext,
    ) -> Result<Map<String, Value>, ExecutionError> {
        let mut resolved = Map::new();
        for (name, raw) in &action.parameters {
            let value = match ParamExpr::parse(raw) {
                ParamExpr::Literal(value) => Some(value),
                ParamExpr::Reference(reference) => reference.resolve(ctx)?,
                ParamExpr::Generate { prompt, context } => {
                    let prompt = interpolate(&prompt, ctx)?;
                    let generated = self
                        .generator
                        .generate(&prompt, context)
                        .await
                        .map_err(ExecutionError::GenerationFailed)?;
                    Some(normalize_output(generated, context)?)
                }
            };
            if let Some(value) = value {
                resolved.insert(name.clone(), value);
            }
        }
        Ok(resolved)
    }

    /// Invoke once per element of the array-valued parameters.
    ///
    /// Stops at the first failing element.
    async fn invoke_mapped(
        &self,
        action: &Action,
        resolved: &Map<String, Value>,
    ) -> Result<Value, ExecutionError> {
        let Some(elements) = expand_map(resolved)? else {
            tracing::warn!(
                "[Workflow] {} is mapped but has no array parameters; invoking once",
                action.id
            );
            return self.registry.invoke(&action.tool, resolved).await;
        };

        let mut results = Vec::with_capacity(elements.len());
        for (index, args) in elements.iter().enumerate() {
            let result = self
                .registry
                .invoke(&action.tool, args)
                .await
                .map_err(|e| ExecutionError::MapElementFailed {
                    index,
                    inner: Box::new(e),
                })?;
            results.push(result);
        }
        Ok(Value::Array(results))
    }
}

fn abort_remaining(report: &mut ExecutionReport, actions: &[Action], reason: &str) {
    for action in actions {
        report.record_failure(&action.id, &ExecutionError::ExecutionAborted(reason.to_string()));
    }
}

/// Build one argument set per element. `None` when no parameter is an array.
///
/// Every array-valued parameter must have the length of the first one.
pub fn expand_map(resolved: &Map<String, Value>) -> Result<Option<Vec<Map<String, Value>>>, ExecutionError> {
    let mut length: Option<usize> = None;
    for (name, value) in resolved {
        if let Value::Array(items) = value {
            match length {
                None => length = Some(items.len()),
                Some(expected) if expected != items.len() => {
                    return Err(ExecutionError::MapLengthMismatch {
                        param: name.clone(),
                        expected,
                        actual: items.len(),
                    });
                }
                Some(_) => {}
            }
        }
    }

    let Some(length) = length else {
        return Ok(None);
    };

    let elements = (0..length)
        .map(|i| {
            resolved
                .iter()
                .map(|(name, value)| {
                    let element = match value {
                        Value::Array(items) => items[i].clone(),
                        other => other.clone(),
                    };
                    (name.clone(), element)
                })
                .collect()
        })
        .collect();
    Ok(Some(elements))
}
