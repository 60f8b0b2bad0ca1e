//! tooldeck Core — transport-agnostic admin-tooling engine.
//!
//! This crate contains the function registry, schema coercion, the workflow
//! executor and the config store. It has **no HTTP framework dependency** by
//! default, making it suitable for use in:
//!
//! - HTTP servers (via `tooldeck-server`)
//! - CLI tools (via `tooldeck-cli`)
//! - Embedding directly in another admin backend
//!
//! # Feature Flags
//!
//! - `axum` — Enables `IntoResponse` impl on `ServerError` for use in axum handlers.

pub mod db;
pub mod error;
pub mod functions;
pub mod registry;
pub mod state;
pub mod store;
pub mod workflow;

// Convenience re-exports
pub use db::Database;
pub use error::{ErrorKind, ExecutionError, ServerError, ValidationError};
pub use registry::{FunctionDescriptor, FunctionRegistry, Handler, ParamSpec, ParamType};
pub use state::{AppState, AppStateInner};
pub use store::ConfigStore;
pub use workflow::{ExecuteOptions, ExecutionReport, WorkflowDocument, WorkflowExecutor};
