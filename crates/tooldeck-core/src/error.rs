//! Error types for the tooldeck core.
//!
//! - `ServerError` is the transport-facing error. When the `axum` feature is
//!   enabled it implements `IntoResponse` so handlers can return it directly.
//! - `ExecutionError` is the per-action failure taxonomy recorded in an
//!   execution report.
//! - `ValidationError` is raised by the pre-flight check before any action runs.

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error type returned by function implementations.
pub type FunctionError = Box<dyn std::error::Error + Send + Sync>;

/// Serializable tag for an [`ExecutionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    UnknownTool,
    MissingRequiredParameter,
    TypeMismatch,
    InvalidEnumValue,
    ReturnTypeMismatch,
    UnresolvedReference,
    MapLengthMismatch,
    GenerationFailed,
    GenerationOutputInvalid,
    ExecutionAborted,
    ImplementationError,
}

/// Failure of a single action (or a direct registry call).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    #[error("UnknownTool: function '{0}' is not registered")]
    UnknownTool(String),

    #[error("MissingRequiredParameter: '{0}' is required")]
    MissingRequiredParameter(String),

    #[error("TypeMismatch: parameter '{param}' expected {expected}, got {actual}")]
    TypeMismatch {
        param: String,
        expected: String,
        actual: String,
    },

    #[error("InvalidEnumValue: parameter '{param}' got '{value}', allowed values are {allowed:?}")]
    InvalidEnumValue {
        param: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("ReturnTypeMismatch: function '{function}' declared {expected}, returned {actual}")]
    ReturnTypeMismatch {
        function: String,
        expected: String,
        actual: String,
    },

    #[error("UnresolvedReference: '{reference}' ({reason})")]
    UnresolvedReference { reference: String, reason: String },

    #[error("MapLengthMismatch: parameter '{param}' has {actual} elements, expected {expected}")]
    MapLengthMismatch {
        param: String,
        expected: usize,
        actual: usize,
    },

    #[error("{inner} (map element {index})")]
    MapElementFailed {
        index: usize,
        inner: Box<ExecutionError>,
    },

    #[error("GenerationFailed: {0}")]
    GenerationFailed(String),

    #[error("GenerationOutputInvalid: {0}")]
    GenerationOutputInvalid(String),

    #[error("ExecutionAborted: {0}")]
    ExecutionAborted(String),

    #[error("ImplementationError: {0}")]
    Implementation(String),
}

impl ExecutionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutionError::UnknownTool(_) => ErrorKind::UnknownTool,
            ExecutionError::MissingRequiredParameter(_) => ErrorKind::MissingRequiredParameter,
            ExecutionError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            ExecutionError::InvalidEnumValue { .. } => ErrorKind::InvalidEnumValue,
            ExecutionError::ReturnTypeMismatch { .. } => ErrorKind::ReturnTypeMismatch,
            ExecutionError::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
            ExecutionError::MapLengthMismatch { .. } => ErrorKind::MapLengthMismatch,
            ExecutionError::MapElementFailed { inner, .. } => inner.kind(),
            ExecutionError::GenerationFailed(_) => ErrorKind::GenerationFailed,
            ExecutionError::GenerationOutputInvalid(_) => ErrorKind::GenerationOutputInvalid,
            ExecutionError::ExecutionAborted(_) => ErrorKind::ExecutionAborted,
            ExecutionError::Implementation(_) => ErrorKind::ImplementationError,
        }
    }

    pub(crate) fn unresolved(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        ExecutionError::UnresolvedReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}

/// Pre-flight failure: the document as a whole cannot run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Malformed workflow document: {0}")]
    Malformed(String),

    #[error("Workflow has no actions")]
    EmptyWorkflow,

    #[error("Duplicate action id '{0}'")]
    DuplicateActionId(String),

    #[error("UnknownTool: workflow references unregistered functions: {}", .0.join(", "))]
    UnknownTool(Vec<String>),

    #[error("Action '{action}' references '{reference}' before it has run")]
    ForwardReference { action: String, reference: String },
}

impl From<ValidationError> for ServerError {
    fn from(err: ValidationError) -> Self {
        ServerError::BadRequest(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, message) = match &self {
            ServerError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ServerError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}
