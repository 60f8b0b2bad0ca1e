//! Workflow engine — executes declarative, multi-step action plans.
//!
//! A workflow document is an ordered list of actions. Each action names a
//! registered function and supplies parameters that are literals, references
//! to user input or earlier results, or generation directives.
//!
//! # Architecture
//!
//! ```text
//! workflow.json ──► WorkflowDocument ──► validate (pre-flight)
//!                                             │
//!                                      WorkflowExecutor ──► FunctionRegistry
//!                                             │
//!                                   Generator (_generate / _transform)
//!                                             │
//!                                      ExecutionReport
//! ```

pub mod context;
pub mod executor;
pub mod generator;
pub mod reference;
pub mod report;
pub mod schema;
pub mod validate;

pub use context::ExecutionContext;
pub use executor::{ExecuteOptions, WorkflowExecutor};
pub use generator::{DisabledGenerator, Generator, GeneratorConfig, LlmGenerator};
pub use reference::{ParamExpr, Reference};
pub use report::{ActionError, ActionResult, ExecutionReport};
pub use schema::{Action, GenerationContext, TransformDirective, WorkflowDocument};
pub use validate::{missing_tools, readiness, validate, WorkflowStatus};
