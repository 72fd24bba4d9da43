use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use pagetrace_core::config::{AuthMode, Config};
use pagetrace_core::session::DeviceSize;
use pagetrace_server::app::build_app;
use pagetrace_server::state::AppState;
use pagetrace_store::{MemoryStore, SessionStore, Website, WebsiteStore};

const CHROME_DESKTOP: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

fn test_config() -> Config {
    Config {
        port: 0,
        geoip_path: "/nonexistent/GeoLite2-City.mmdb".to_string(),
        auth_mode: AuthMode::None,
        public_url: "http://localhost:3000".to_string(),
        seed_domain: None,
    }
}

/// Fresh in-memory store + state + app, with one registered website.
async fn setup() -> (Arc<MemoryStore>, axum::Router) {
    let store = Arc::new(MemoryStore::new());
    store
        .create_website(Website {
            id: "w1".to_string(),
            domain: "example.com".to_string(),
            site_id: "P-TESTTOKEN".to_string(),
            owner: "admin".to_string(),
            created_at: Utc::now(),
        })
        .await
        .expect("seed website");
    let state = Arc::new(AppState::new(Arc::clone(&store), test_config()));
    let app = build_app(state);
    (store, app)
}

fn collect_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/collect")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "1.2.3.4")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

async fn json_body(response: axum::http::Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("parse JSON")
}

fn event(event_type: &str, session_id: &str, extra: Value) -> String {
    let mut body = json!({
        "type": event_type,
        "domain": "example.com",
        "siteId": "P-TESTTOKEN",
        "sessionId": session_id,
        "visitorId": "v1",
        "userAgent": CHROME_DESKTOP,
        "url": "https://example.com/blog/post",
    });
    if let (Some(map), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            map.insert(k.clone(), v.clone());
        }
    }
    body.to_string()
}

#[tokio::test]
async fn missing_event_type_is_rejected() {
    let (_store, app) = setup().await;
    let body = json!({
        "domain": "example.com",
        "siteId": "P-TESTTOKEN",
        "sessionId": "s1"
    })
    .to_string();
    let response = app.oneshot(collect_request(&body)).await.expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "invalid_payload");
}

#[tokio::test]
async fn missing_session_id_is_rejected() {
    let (_store, app) = setup().await;
    let body = json!({
        "type": "page_view",
        "domain": "example.com",
        "siteId": "P-TESTTOKEN"
    })
    .to_string();
    let response = app.oneshot(collect_request(&body)).await.expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_site_identity_is_rejected() {
    let (_store, app) = setup().await;
    let body = json!({ "type": "page_view", "sessionId": "s1" }).to_string();
    let response = app.oneshot(collect_request(&body)).await.expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_site_is_404() {
    let (_store, app) = setup().await;
    let body = json!({
        "type": "page_view",
        "domain": "example.com",
        "siteId": "P-STALETOKEN",
        "sessionId": "s1"
    })
    .to_string();
    let response = app.oneshot(collect_request(&body)).await.expect("request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn page_view_creates_an_enriched_session() {
    let (store, app) = setup().await;
    let body = event(
        "page_view",
        "s1",
        json!({
            "screenWidth": 1000,
            "referrer": "https://news.ycombinator.com/",
            "utm_source": "newsletter",
            "timestamp": 1_700_000_000_000_i64
        }),
    );
    let response = app.oneshot(collect_request(&body)).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["success"], true);

    let session = store
        .find_session("s1")
        .await
        .expect("store read")
        .expect("session created");
    assert_eq!(session.website_id, "w1");
    assert_eq!(session.visitor_id, "v1");
    assert_eq!(session.entry_page, "https://example.com/blog/post");
    assert_eq!(session.entry_time.timestamp_millis(), 1_700_000_000_000);
    assert_eq!(session.browser.as_deref(), Some("Chrome"));
    // Desktop UA + 1000px screen → Laptop.
    assert_eq!(session.device_size, DeviceSize::Laptop);
    assert_eq!(session.referrer.as_deref(), Some("https://news.ycombinator.com/"));
    assert_eq!(session.utm_source.as_deref(), Some("newsletter"));
    // GeoIP database absent → empty geography, request still succeeded.
    assert!(session.country.is_none());
    assert!(session.exit_time.is_none());
    assert!(session.active_time_ms.is_none());
}

#[tokio::test]
async fn duplicate_page_view_is_idempotent() {
    let (store, app) = setup().await;
    let t0: i64 = 1_700_000_000_000;

    let first = event("page_view", "s1", json!({ "timestamp": t0 }));
    let response = app
        .clone()
        .oneshot(collect_request(&first))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);

    // Retried send 10 s later: no second row, only the heartbeat moves.
    let retry = event(
        "page_view",
        "s1",
        json!({ "timestamp": t0 + 10_000, "url": "https://example.com/elsewhere" }),
    );
    let response = app.oneshot(collect_request(&retry)).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);

    let windowed = store
        .sessions_in_window(
            "w1",
            Utc.timestamp_millis_opt(t0 - 1000).single().expect("time"),
            Utc.timestamp_millis_opt(t0 + 60_000).single().expect("time"),
        )
        .await
        .expect("window query");
    assert_eq!(windowed.len(), 1);

    let session = store
        .find_session("s1")
        .await
        .expect("store read")
        .expect("session");
    assert_eq!(session.entry_time.timestamp_millis(), t0);
    assert_eq!(session.entry_page, "https://example.com/blog/post");
    assert_eq!(session.last_heartbeat_at.timestamp_millis(), t0 + 10_000);
}

#[tokio::test]
async fn heartbeat_before_page_view_is_a_noop() {
    let (store, app) = setup().await;
    let body = event("heartbeat", "never-seen", json!({}));
    let response = app.oneshot(collect_request(&body)).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["success"], true);
    assert!(store
        .find_session("never-seen")
        .await
        .expect("store read")
        .is_none());
}

#[tokio::test]
async fn page_exit_before_page_view_is_a_noop() {
    let (store, app) = setup().await;
    let body = event("page_exit", "never-seen", json!({ "active_time": 12_000 }));
    let response = app.oneshot(collect_request(&body)).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(store
        .find_session("never-seen")
        .await
        .expect("store read")
        .is_none());
}

#[tokio::test]
async fn unknown_event_type_is_rejected() {
    let (_store, app) = setup().await;
    let body = event("click", "s1", json!({}));
    let response = app.oneshot(collect_request(&body)).await.expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn full_session_lifecycle() {
    let (store, app) = setup().await;
    let d0: i64 = 1_700_000_000_000;

    let view = event("page_view", "s1", json!({ "timestamp": d0 }));
    let beat = event("heartbeat", "s1", json!({ "timestamp": d0 + 10_000 }));
    let exit = event(
        "page_exit",
        "s1",
        json!({ "timestamp": d0 + 40_000, "active_time": 35_000 }),
    );
    for body in [view, beat, exit] {
        let response = app
            .clone()
            .oneshot(collect_request(&body))
            .await
            .expect("request");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let session = store
        .find_session("s1")
        .await
        .expect("store read")
        .expect("session");
    assert_eq!(session.entry_time.timestamp_millis(), d0);
    assert_eq!(
        session.exit_time.map(|t| t.timestamp_millis()),
        Some(d0 + 40_000)
    );
    assert_eq!(session.exit_page.as_deref(), Some("https://example.com/blog/post"));
    assert_eq!(session.active_time_ms, Some(35_000));
    assert_eq!(session.last_heartbeat_at.timestamp_millis(), d0 + 10_000);
}

#[tokio::test]
async fn options_preflight_is_cors_open() {
    let (_store, app) = setup().await;
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/collect")
        .header("origin", "https://example.com")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .expect("build request");
    let response = app.oneshot(request).await.expect("request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
