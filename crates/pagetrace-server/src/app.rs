use std::sync::Arc;

use axum::{
    extract::Request,
    http::{Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth, routes, state::AppState};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order (outermost runs first on
/// request, last on response):
///
/// 1. `TraceLayer` — structured request/response logging via `tracing`.
/// 2. `CorsLayer` — permissive CORS: the probe script is embedded on
///    third-party sites, so `/api/collect` must answer cross-origin
///    preflights from any origin.
///
/// Dashboard routes (websites + aggregations) sit behind the auth
/// middleware; the ingestion surface, the probe script, and the health
/// probe stay open.
pub fn build_app(state: Arc<AppState>) -> Router {
    let dashboard = Router::new()
        .route(
            "/api/websites",
            get(routes::websites::list_websites).post(routes::websites::create_website),
        )
        .route(
            "/api/websites/{id}",
            delete(routes::websites::delete_website),
        )
        .route(
            "/api/websites/{id}/analytics",
            get(routes::analytics::get_analytics),
        )
        .route(
            "/api/websites/{id}/locations",
            get(routes::analytics::get_locations),
        )
        .route(
            "/api/websites/{id}/devices",
            get(routes::analytics::get_devices),
        )
        .route(
            "/api/websites/{id}/sources",
            get(routes::analytics::get_sources),
        )
        .route("/api/websites/{id}/pages", get(routes::analytics::get_pages))
        .route(
            "/api/websites/{id}/live",
            get(routes::analytics::get_live_visitors),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/trace.js", get(routes::script::probe_script))
        .route("/api/collect", post(routes::collect::collect))
        .merge(dashboard)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(middleware::from_fn(preflight_no_content))
        .with_state(state)
}

/// The CORS layer answers preflights itself with 200; the collect contract
/// promises an empty 204. Outermost layer, so it sees the layer's response.
async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_options = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_options && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}
