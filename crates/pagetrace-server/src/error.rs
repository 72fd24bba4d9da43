use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level errors that map directly to HTTP responses.
///
/// Every variant implements [`IntoResponse`] so Axum handlers can use
/// `Result<impl IntoResponse, AppError>` as their return type. Bodies carry
/// a short machine code and message, never internal failure detail.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("domain already registered")]
    DomainTaken,

    /// A store read under an aggregation route failed. Surfaced uniformly so
    /// the dashboard can render a generic retry state.
    #[error("failed to fetch")]
    FetchFailed,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_payload", msg.as_str())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.as_str()),
            AppError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "unauthorized", "Not authenticated")
            }
            AppError::DomainTaken => (
                StatusCode::CONFLICT,
                "domain_taken",
                "Domain already registered",
            ),
            AppError::FetchFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed_to_fetch",
                "Failed to fetch analytics",
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };

        (
            status,
            Json(json!({
                "error": {
                    "code": code,
                    "message": message
                }
            })),
        )
            .into_response()
    }
}
