pub mod auth;
pub mod config;
pub mod functions;
pub mod workflow;

use axum::{middleware, Router};

use tooldeck_core::AppState;

/// Build the complete API router with all sub-routes.
///
/// Every route here sits behind the session check; `/health` is added by the
/// caller outside of it.
pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/functions", functions::router())
        .nest("/workflow", workflow::router())
        .nest("/config", config::router())
        .route_layer(middleware::from_fn_with_state(state, auth::require_session))
}
