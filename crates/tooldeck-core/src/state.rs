//! Shared application state for the HTTP server and the CLI.

use std::sync::Arc;

use crate::db::Database;
use crate::functions::register_builtins;
use crate::registry::FunctionRegistry;
use crate::store::ConfigStore;
use crate::workflow::{Generator, GeneratorConfig, LlmGenerator, WorkflowExecutor};

/// Shared state accessible by all API handlers.
pub struct AppStateInner {
    pub db: Database,
    pub registry: Arc<FunctionRegistry>,
    pub config_store: ConfigStore,
    pub executor: WorkflowExecutor,
    /// Accepted `x-session-token` values; empty disables the check.
    pub session_tokens: Vec<String>,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    /// Built-ins registered; an LLM generator is wired in when
    /// `TOOLDECK_LLM_API_KEY` (or `ANTHROPIC_API_KEY`) is set.
    pub fn new(db: Database) -> Self {
        let config_store = ConfigStore::new(db.clone());
        let registry = Arc::new(FunctionRegistry::new());
        register_builtins(&registry, config_store.clone());

        let mut executor = WorkflowExecutor::new(registry.clone());
        if let Some(config) = GeneratorConfig::from_env() {
            tracing::info!("Generation enabled (model: {})", config.model);
            executor = executor.with_generator(Arc::new(LlmGenerator::new(config)));
        }

        Self {
            db,
            registry,
            config_store,
            executor,
            session_tokens: Vec::new(),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.executor = self.executor.with_generator(generator);
        self
    }

    pub fn with_session_tokens(mut self, tokens: Vec<String>) -> Self {
        self.session_tokens = tokens.into_iter().filter(|t| !t.is_empty()).collect();
        self
    }

    pub fn is_authorized(&self, token: Option<&str>) -> bool {
        self.session_tokens.is_empty()
            || token.is_some_and(|t| self.session_tokens.iter().any(|s| s == t))
    }
}
