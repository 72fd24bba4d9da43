use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use pagetrace_core::analytics::{self, DateRange, LIVE_WINDOW_SECONDS};
use pagetrace_core::session::Session;

use crate::{error::AppError, state::AppState};

/// Shared `?from=YYYY-MM-DD&to=YYYY-MM-DD` range. Unparseable values fall
/// back to the default trailing-30-day window, same as absent ones.
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl RangeQuery {
    fn resolve(&self) -> DateRange {
        let parse = |raw: &Option<String>| {
            raw.as_deref()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        };
        DateRange::resolve(parse(&self.from), parse(&self.to), Utc::now().date_naive())
    }
}

/// Fetch the session rows for one (website, window) pair.
///
/// Unknown website ids are 404; a store read failure is surfaced uniformly
/// as `failed_to_fetch` so the dashboard can render a retry state.
async fn sessions_in_range(
    state: &AppState,
    website_id: &str,
    range: DateRange,
) -> Result<Vec<Session>, AppError> {
    if state
        .websites
        .get_website(website_id)
        .await
        .map_err(|e| {
            tracing::error!(website_id, error = %e, "website lookup failed");
            AppError::FetchFailed
        })?
        .is_none()
    {
        return Err(AppError::NotFound("Website not found".to_string()));
    }

    state
        .sessions
        .sessions_in_window(website_id, range.start, range.end)
        .await
        .map_err(|e| {
            tracing::error!(website_id, error = %e, "session window query failed");
            AppError::FetchFailed
        })
}

/// `GET /api/websites/{id}/analytics` — daily series + headline metrics.
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Path(website_id): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = sessions_in_range(&state, &website_id, query.resolve()).await?;
    Ok(Json(analytics::summarize(&sessions)))
}

/// `GET /api/websites/{id}/locations` — visitors by country with map
/// intensity values.
pub async fn get_locations(
    State(state): State<Arc<AppState>>,
    Path(website_id): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = sessions_in_range(&state, &website_id, query.resolve()).await?;
    Ok(Json(json!({ "locations": analytics::locations(&sessions) })))
}

/// `GET /api/websites/{id}/devices` — device class / browser / OS
/// breakdowns.
pub async fn get_devices(
    State(state): State<Arc<AppState>>,
    Path(website_id): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = sessions_in_range(&state, &website_id, query.resolve()).await?;
    Ok(Json(analytics::devices(&sessions)))
}

/// `GET /api/websites/{id}/sources` — referrer sources.
pub async fn get_sources(
    State(state): State<Arc<AppState>>,
    Path(website_id): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = sessions_in_range(&state, &website_id, query.resolve()).await?;
    Ok(Json(json!({ "sources": analytics::sources(&sessions) })))
}

/// `GET /api/websites/{id}/pages` — entry/exit page paths.
pub async fn get_pages(
    State(state): State<Arc<AppState>>,
    Path(website_id): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = sessions_in_range(&state, &website_id, query.resolve()).await?;
    Ok(Json(analytics::pages(&sessions)))
}

/// `GET /api/websites/{id}/live` — distinct visitors with a heartbeat in
/// the trailing 30-second window. A liveness proxy, not an open-tab count.
pub async fn get_live_visitors(
    State(state): State<Arc<AppState>>,
    Path(website_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if state
        .websites
        .get_website(&website_id)
        .await
        .map_err(|e| {
            tracing::error!(website_id, error = %e, "website lookup failed");
            AppError::FetchFailed
        })?
        .is_none()
    {
        return Err(AppError::NotFound("Website not found".to_string()));
    }

    let since = Utc::now() - Duration::seconds(LIVE_WINDOW_SECONDS);
    let sessions = state
        .sessions
        .sessions_active_since(&website_id, since)
        .await
        .map_err(|e| {
            tracing::error!(website_id, error = %e, "live visitor query failed");
            AppError::FetchFailed
        })?;

    Ok(Json(
        json!({ "liveVisitors": analytics::live_visitors(&sessions) }),
    ))
}
