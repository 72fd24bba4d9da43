use axum::{http::header, response::IntoResponse};

/// The browser probe, embedded into the binary at compile time.
const PROBE_SCRIPT: &str = include_str!("../../assets/trace.js");

/// `GET /trace.js` — the embeddable probe script.
///
/// Served open (no auth, CORS handled by the layer) with a day of cache:
/// the script is versioned with the binary, not per-site.
pub async fn probe_script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        PROBE_SCRIPT,
    )
}
