//! tooldeck Server - admin tooling backend
//!
//! A standalone HTTP backend exposing the tooldeck engine:
//! - Function catalog and direct invocation
//! - Workflow execution and pre-flight validation
//! - Config store CRUD
//!
//! This crate can be used standalone (`tooldeck server`) or embedded in
//! another application via [`start_server_with_state`].

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use tooldeck_core::{AppState, AppStateInner, Database};

/// Default `EnvFilter` directives when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "tooldeck_server=info,tooldeck_core=info,tower_http=info";

/// Configuration for the tooldeck backend server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    /// Accepted `x-session-token` values. Empty disables authentication.
    pub session_tokens: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3220,
            db_path: "tooldeck.db".to_string(),
            session_tokens: Vec::new(),
        }
    }
}

/// Split a comma separated token list, dropping blanks.
pub fn parse_session_tokens(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Initialise the global tracing subscriber. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .try_init();
}

/// Create a shared `AppState` from a database path.
pub fn create_app_state(db_path: &str, session_tokens: Vec<String>) -> Result<AppState, String> {
    let db = Database::open(db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(Arc::new(
        AppStateInner::new(db).with_session_tokens(session_tokens),
    ))
}

/// Start the tooldeck backend server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    init_tracing();

    tracing::info!(
        "Starting tooldeck server on {}:{}",
        config.host,
        config.port
    );

    let state = create_app_state(&config.db_path, config.session_tokens.clone())?;
    start_server_with_state(config, state).await
}

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::api_router(state.clone()))
        .route("/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server with a pre-built `AppState`.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    if !state.session_tokens.is_empty() {
        tracing::info!("Session authentication enabled ({} token(s))", state.session_tokens.len());
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("tooldeck server listening on {}", local_addr);

    let app = app(state);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "tooldeck-server",
        "version": env!("CARGO_PKG_VERSION"),
        "functions": state.registry.names().len(),
    }))
}
