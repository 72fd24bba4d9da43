use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use pagetrace_core::config::AuthMode;

use crate::{error::AppError, state::AppState};

/// Require a resolvable caller identity on dashboard routes.
///
/// Runs before any data access: an unauthenticated caller short-circuits
/// with 401 uniformly across every aggregation and provisioning entry
/// point. The collect endpoint and the probe script are never behind this
/// — they are the public ingestion surface.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    match &state.config.auth_mode {
        AuthMode::None => next.run(request).await,
        AuthMode::Token(expected) => {
            let presented = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "));
            match presented {
                Some(token) if token == expected => next.run(request).await,
                _ => AppError::Unauthorized.into_response(),
            }
        }
    }
}
