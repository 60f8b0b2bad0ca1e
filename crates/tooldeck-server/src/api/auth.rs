use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use tooldeck_core::{AppState, ServerError};

/// Header carrying the caller's session token.
pub const SESSION_HEADER: &str = "x-session-token";

/// Reject requests without an accepted session token (when tokens are configured).
pub async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let token = request
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok());

    if !state.is_authorized(token) {
        tracing::warn!("Rejected {} {}: invalid session token", request.method(), request.uri().path());
        return Err(ServerError::Unauthorized(
            "missing or invalid session token".to_string(),
        ));
    }
    Ok(next.run(request).await)
}
