use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use serde_json::json;

use pagetrace_core::{
    event::{CollectPayload, EventType},
    session::{DeviceSize, Session, SessionExit},
};

use crate::{error::AppError, state::AppState};

/// Screens narrower than this are classified Laptop when the User-Agent
/// carries no mobile/tablet signal.
const LAPTOP_WIDTH_PX: u32 = 1280;

/// `POST /api/collect` — the only write path into the session store.
///
/// Public and CORS-open: the probe runs on third-party pages. The handler
/// is stateless; idempotence rests on the store's create-or-touch upsert
/// keyed by `session_id`.
///
/// Dispatch by event type:
/// - `page_view` — create the session row with all enrichment fields; a
///   duplicate (or racing) send degenerates to a heartbeat bump.
/// - `heartbeat` — bump `last_heartbeat_at`; silent no-op for unknown
///   sessions.
/// - `page_exit` — record exit page/time and accumulated active time; same
///   no-op tolerance.
///
/// Enrichment (UA parse, GeoIP) is best-effort and never fails the
/// request; store-write failures surface as 500 and are logged.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn collect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CollectPayload>,
) -> Result<impl IntoResponse, AppError> {
    // --- Validation: event type, session id, site identity ---
    let event_type = payload
        .event_type
        .as_deref()
        .and_then(EventType::parse)
        .ok_or_else(|| AppError::BadRequest("missing or unknown event type".to_string()))?;

    let session_id = payload
        .session_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("missing sessionId".to_string()))?
        .to_string();

    if payload.domain.is_none() && payload.site_id.is_none() {
        return Err(AppError::BadRequest("missing site identity".to_string()));
    }

    // --- Site resolution: guards against spoofed or stale snippets ---
    let website = state
        .websites
        .find_website(
            payload.domain.as_deref().unwrap_or(""),
            payload.site_id.as_deref().unwrap_or(""),
        )
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("Website not found".to_string()))?;

    let event_time = payload.event_time();

    match event_type {
        EventType::PageView => {
            let ua_info = parse_user_agent(payload.user_agent.as_deref().unwrap_or(""));
            let device_size = classify_device(ua_info.as_ref(), payload.screen_width);
            let geo = match extract_client_ip(&headers) {
                Some(ip) => state.lookup_geo(&ip),
                None => Default::default(),
            };

            let session = Session {
                website_id: website.id,
                visitor_id: payload.visitor_id.clone().unwrap_or_default(),
                session_id,
                entry_page: payload.url.clone().unwrap_or_default(),
                entry_time: event_time,
                exit_page: None,
                exit_time: None,
                active_time_ms: None,
                last_heartbeat_at: event_time,
                referrer: payload.referrer.clone(),
                utm_source: payload.utm_source.clone(),
                utm_campaign: payload.utm_campaign.clone(),
                device_size,
                browser: ua_info.as_ref().map(|u| u.browser.clone()),
                os: ua_info.as_ref().map(|u| u.os.clone()),
                country: geo.country,
                country_code: geo.country_code,
                region: geo.region,
                city: geo.city,
            };
            state
                .sessions
                .create_session(session)
                .await
                .map_err(AppError::Internal)?;
        }
        EventType::Heartbeat => {
            // No-op (not an error) when the page_view never arrived.
            state
                .sessions
                .touch_heartbeat(&session_id, event_time)
                .await
                .map_err(AppError::Internal)?;
        }
        EventType::PageExit => {
            state
                .sessions
                .record_exit(
                    &session_id,
                    SessionExit {
                        exit_page: payload.url.clone(),
                        exit_time: event_time,
                        active_time_ms: payload.active_time,
                    },
                )
                .await
                .map_err(AppError::Internal)?;
        }
    }

    Ok(Json(json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Client IP from trusted proxy headers: first `X-Forwarded-For` entry,
/// else `X-Real-IP`.
fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Parsed User-Agent fields.
#[derive(Debug, Clone)]
pub(crate) struct UaInfo {
    browser: String,
    os: String,
    signal: DeviceSignal,
}

/// Device signal carried by the User-Agent itself, before the screen-width
/// fallback is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceSignal {
    Mobile,
    Tablet,
    Other,
}

/// Parse a `User-Agent` string via the `woothee` crate.
///
/// Returns `None` if the UA string is empty or cannot be classified.
fn parse_user_agent(user_agent: &str) -> Option<UaInfo> {
    if user_agent.is_empty() {
        return None;
    }

    let result = woothee::parser::Parser::new().parse(user_agent)?;
    let signal = match result.category {
        "smartphone" | "mobilephone" => DeviceSignal::Mobile,
        "tablet" => DeviceSignal::Tablet,
        _ => DeviceSignal::Other,
    };

    Some(UaInfo {
        browser: result.name.to_string(),
        os: result.os.to_string(),
        signal,
    })
}

/// Device class decision order: an explicit mobile/tablet UA signal wins;
/// otherwise a reported screen width under [`LAPTOP_WIDTH_PX`] means
/// Laptop, and everything else is Desktop.
fn classify_device(ua_info: Option<&UaInfo>, screen_width: Option<u32>) -> DeviceSize {
    match ua_info.map(|u| u.signal) {
        Some(DeviceSignal::Mobile) => DeviceSize::Mobile,
        Some(DeviceSignal::Tablet) => DeviceSize::Tablet,
        _ => {
            if screen_width.is_some_and(|w| w < LAPTOP_WIDTH_PX) {
                DeviceSize::Laptop
            } else {
                DeviceSize::Desktop
            }
        }
    }
}
