//! Function registry — typed, schema-described operations a workflow can call.
//!
//! Application code registers [`FunctionDescriptor`]s at startup. The
//! registry is then shared read-only (behind an `Arc`) with the workflow
//! executor and the HTTP layer.
//!
//! ```ignore
//! let registry = FunctionRegistry::new();
//! registry.register(
//!     "add",
//!     FunctionDescriptor::new("Add two numbers", Handler::positional_sync(|args| {
//!         Ok(json!(args[0].as_f64().unwrap_or(0.0) + args[1].as_f64().unwrap_or(0.0)))
//!     }))
//!     .param(ParamSpec::number("a"))
//!     .param(ParamSpec::number("b"))
//!     .returns(ParamSpec::number("sum")),
//! );
//! let sum = registry.invoke("add", &args).await?;
//! ```

pub mod schema;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{ExecutionError, FunctionError};

pub use schema::{ParamSpec, ParamType};

/// Result type of a function implementation.
pub type FunctionResult = Result<Value, FunctionError>;

/// Arguments handed to an implementation, shaped by its calling convention.
#[derive(Debug, Clone, PartialEq)]
pub enum Arguments {
    /// Declared parameter order; absent optionals are `null`.
    Positional(Vec<Value>),
    /// Keyed by parameter name; absent optionals are omitted.
    Named(Map<String, Value>),
}

/// How an implementation expects its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingConvention {
    Positional,
    Named,
}

/// An invocable function body.
#[async_trait]
pub trait FunctionHandler: Send + Sync {
    async fn call(&self, args: Arguments) -> FunctionResult;
}

struct PositionalFn<F>(F);

#[async_trait]
impl<F, Fut> FunctionHandler for PositionalFn<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = FunctionResult> + Send,
{
    async fn call(&self, args: Arguments) -> FunctionResult {
        match args {
            Arguments::Positional(values) => (self.0)(values).await,
            Arguments::Named(map) => (self.0)(map.into_iter().map(|(_, v)| v).collect()).await,
        }
    }
}

struct NamedFn<F>(F);

#[async_trait]
impl<F, Fut> FunctionHandler for NamedFn<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = FunctionResult> + Send,
{
    async fn call(&self, args: Arguments) -> FunctionResult {
        match args {
            Arguments::Named(map) => (self.0)(map).await,
            Arguments::Positional(_) => Err("named function called with positional arguments".into()),
        }
    }
}

/// An implementation together with its calling convention.
///
/// The convention is fixed when the handler is built and never re-inferred
/// per call.
#[derive(Clone)]
pub struct Handler {
    convention: CallingConvention,
    inner: Arc<dyn FunctionHandler>,
}

impl Handler {
    pub fn custom(convention: CallingConvention, inner: Arc<dyn FunctionHandler>) -> Self {
        Self { convention, inner }
    }

    /// Async implementation receiving arguments in declared order.
    pub fn positional<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FunctionResult> + Send + 'static,
    {
        Self::custom(CallingConvention::Positional, Arc::new(PositionalFn(f)))
    }

    /// Async implementation receiving a single named-argument object.
    pub fn named<F, Fut>(f: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FunctionResult> + Send + 'static,
    {
        Self::custom(CallingConvention::Named, Arc::new(NamedFn(f)))
    }

    pub fn positional_sync<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> FunctionResult + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::positional(move |args| {
            let f = f.clone();
            async move { f(args) }
        })
    }

    pub fn named_sync<F>(f: F) -> Self
    where
        F: Fn(Map<String, Value>) -> FunctionResult + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::named(move |args| {
            let f = f.clone();
            async move { f(args) }
        })
    }

    pub fn convention(&self) -> CallingConvention {
        self.convention
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("convention", &self.convention)
            .finish_non_exhaustive()
    }
}

/// A registered function: schema plus implementation.
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
    pub returns: Option<ParamSpec>,
    pub handler: Handler,
}

impl FunctionDescriptor {
    /// The name is assigned by [`FunctionRegistry::register`].
    pub fn new(description: impl Into<String>, handler: Handler) -> Self {
        Self {
            name: String::new(),
            description: description.into(),
            parameters: Vec::new(),
            returns: None,
            handler,
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn returns(mut self, spec: ParamSpec) -> Self {
        self.returns = Some(spec);
        self
    }

    /// Planner-facing description: `{name, description, parameters, required}`.
    pub fn describe(&self) -> Value {
        let (properties, required) = schema::properties_and_required(&self.parameters);
        let mut out = serde_json::json!({
            "name": self.name,
            "description": self.description,
            "parameters": properties,
            "required": required,
        });
        if let Some(returns) = &self.returns {
            out["returns"] = returns.to_json_schema();
        }
        out
    }

    /// Coerce raw named input into the implementation's argument shape.
    pub fn prepare_arguments(&self, raw: &Map<String, Value>) -> Result<Arguments, ExecutionError> {
        let mut coerced = Vec::with_capacity(self.parameters.len());
        for spec in &self.parameters {
            coerced.push((spec.name.clone(), spec.coerce(raw.get(&spec.name))?));
        }

        Ok(match self.handler.convention() {
            CallingConvention::Positional => Arguments::Positional(
                coerced
                    .into_iter()
                    .map(|(_, v)| v.unwrap_or(Value::Null))
                    .collect(),
            ),
            CallingConvention::Named => Arguments::Named(
                coerced
                    .into_iter()
                    .filter_map(|(name, v)| v.map(|v| (name, v)))
                    .collect(),
            ),
        })
    }
}

/// In-memory table of callable functions.
///
/// Registration is last-write-wins. Lookups hand out `Arc`s so an in-flight
/// call is unaffected by a later re-registration.
pub struct FunctionRegistry {
    functions: RwLock<HashMap<String, Arc<FunctionDescriptor>>>,
    validate_returns: bool,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: RwLock::new(HashMap::new()),
            validate_returns: false,
        }
    }

    /// Check results against each function's declared `returns`.
    pub fn with_return_validation(mut self, enabled: bool) -> Self {
        self.validate_returns = enabled;
        self
    }

    /// Insert or replace a function under `name`.
    pub fn register(&self, name: impl Into<String>, mut descriptor: FunctionDescriptor) {
        let name = name.into();
        descriptor.name = name.clone();
        let mut functions = self.functions.write().unwrap_or_else(|e| e.into_inner());
        if functions.insert(name.clone(), Arc::new(descriptor)).is_some() {
            tracing::debug!("Replaced function '{}'", name);
        } else {
            tracing::debug!("Registered function '{}'", name);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<FunctionDescriptor>> {
        self.functions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .functions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn describe(&self, name: &str) -> Option<Value> {
        self.lookup(name).map(|d| d.describe())
    }

    /// The tool-description feed for the planner, sorted by name.
    pub fn describe_all(&self) -> Vec<Value> {
        self.names()
            .iter()
            .filter_map(|name| self.describe(name))
            .collect()
    }

    /// Validate, coerce and call a function.
    pub async fn invoke(&self, name: &str, args: &Map<String, Value>) -> Result<Value, ExecutionError> {
        let descriptor = self
            .lookup(name)
            .ok_or_else(|| ExecutionError::UnknownTool(name.to_string()))?;

        let arguments = descriptor.prepare_arguments(args)?;

        let result = descriptor
            .handler
            .inner
            .call(arguments)
            .await
            .map_err(|e| ExecutionError::Implementation(e.to_string()))?;

        if self.validate_returns {
            if let Some(returns) = &descriptor.returns {
                returns.check_return(name, &result)?;
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn add_descriptor() -> FunctionDescriptor {
        FunctionDescriptor::new(
            "Add two numbers",
            Handler::positional_sync(|args| {
                let a = args[0].as_f64().ok_or("a is not a number")?;
                let b = args[1].as_f64().ok_or("b is not a number")?;
                Ok(json!(a + b))
            }),
        )
        .param(ParamSpec::number("a"))
        .param(ParamSpec::number("b"))
        .returns(ParamSpec::number("sum"))
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_invoke_positional_with_coercion() {
        let registry = FunctionRegistry::new();
        registry.register("add", add_descriptor());

        let result = registry
            .invoke("add", &args(json!({ "a": 1, "b": "2" })))
            .await
            .unwrap();
        assert_eq!(result, json!(3.0));
    }

    #[tokio::test]
    async fn test_invoke_named_omits_absent_optionals() {
        let registry = FunctionRegistry::new();
        registry.register(
            "greet",
            FunctionDescriptor::new(
                "Greet someone",
                Handler::named_sync(|args| Ok(Value::Object(args))),
            )
            .param(ParamSpec::string("name"))
            .param(ParamSpec::string("title").optional()),
        );

        let result = registry
            .invoke("greet", &args(json!({ "name": "Ada", "ignored": 1 })))
            .await
            .unwrap();
        assert_eq!(result, json!({ "name": "Ada" }));
    }

    #[tokio::test]
    async fn test_invoke_async_handler() {
        let registry = FunctionRegistry::new();
        registry.register(
            "echo",
            FunctionDescriptor::new(
                "Echo",
                Handler::named(|args| async move {
                    tokio::task::yield_now().await;
                    Ok(args.get("text").cloned().unwrap_or(Value::Null))
                }),
            )
            .param(ParamSpec::string("text")),
        );
        let result = registry
            .invoke("echo", &args(json!({ "text": "hi" })))
            .await
            .unwrap();
        assert_eq!(result, json!("hi"));
    }

    #[tokio::test]
    async fn test_invoke_errors() {
        let registry = FunctionRegistry::new();
        registry.register("add", add_descriptor());

        let err = registry.invoke("sub", &Map::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownTool);

        let err = registry
            .invoke("add", &args(json!({ "a": 1 })))
            .await
            .unwrap_err();
        assert_eq!(err, ExecutionError::MissingRequiredParameter("b".into()));

        let err = registry
            .invoke("add", &args(json!({ "a": 1, "b": "two" })))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[tokio::test]
    async fn test_implementation_error_is_wrapped() {
        let registry = FunctionRegistry::new();
        registry.register(
            "boom",
            FunctionDescriptor::new("Always fails", Handler::positional_sync(|_| Err("kaboom".into()))),
        );
        let err = registry.invoke("boom", &Map::new()).await.unwrap_err();
        assert_eq!(err, ExecutionError::Implementation("kaboom".into()));
    }

    #[tokio::test]
    async fn test_return_validation_is_opt_in() {
        let lying = || {
            FunctionDescriptor::new("Returns a string", Handler::positional_sync(|_| Ok(json!("3"))))
                .returns(ParamSpec::number("n"))
        };

        let lenient = FunctionRegistry::new();
        lenient.register("n", lying());
        assert_eq!(lenient.invoke("n", &Map::new()).await.unwrap(), json!("3"));

        let strict = FunctionRegistry::new().with_return_validation(true);
        strict.register("n", lying());
        let err = strict.invoke("n", &Map::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReturnTypeMismatch);
    }

    #[test]
    fn test_register_is_last_write_wins() {
        let registry = FunctionRegistry::new();
        registry.register("add", add_descriptor());
        registry.register(
            "add",
            FunctionDescriptor::new("Replacement", Handler::positional_sync(|_| Ok(json!(0)))),
        );
        assert_eq!(registry.names(), vec!["add".to_string()]);
        assert_eq!(registry.lookup("add").unwrap().description, "Replacement");
    }

    #[test]
    fn test_describe_is_stable() {
        let registry = FunctionRegistry::new();
        registry.register("add", add_descriptor());
        registry.register(
            "notify",
            FunctionDescriptor::new("Send a notification", Handler::named_sync(|_| Ok(Value::Null)))
                .param(ParamSpec::string("message").describe("Body text"))
                .param(ParamSpec::enumeration("priority", ["high", "normal", "low"]).optional()),
        );

        let first = registry.describe("notify").unwrap();
        let second = registry.describe("notify").unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            json!({
                "name": "notify",
                "description": "Send a notification",
                "parameters": {
                    "message": { "type": "string", "description": "Body text" },
                    "priority": { "type": "enum", "enum": ["high", "normal", "low"] }
                },
                "required": ["message"]
            })
        );

        let all = registry.describe_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0]["name"], "add");
        assert_eq!(all[0]["returns"], json!({ "type": "number" }));
    }

    #[test]
    fn test_register_survives_poisoned_lock() {
        let registry = FunctionRegistry::new();
        registry.register("add", add_descriptor());
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = registry.functions.write().unwrap();
            panic!("poison the registry lock");
        }));
        assert!(registry.functions.is_poisoned());

        registry.register(
            "notify",
            FunctionDescriptor::new("Send a notification", Handler::named_sync(|_| Ok(Value::Null))),
        );
        assert_eq!(registry.names(), vec!["add", "notify"]);
        assert!(registry.lookup("notify").is_some());
        assert!(registry.contains("add"));
    }
}
