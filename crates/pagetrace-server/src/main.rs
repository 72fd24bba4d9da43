use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use pagetrace_server::state::AppState;
use pagetrace_store::{MemoryStore, Website, WebsiteStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pagetrace=info".parse()?),
        )
        .json()
        .init();

    let cfg = pagetrace_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // A missing GeoIP database is a warning, not a failure: sessions are
    // stored with empty geography fields.
    if !std::path::Path::new(&cfg.geoip_path).exists() {
        tracing::warn!(
            geoip_path = %cfg.geoip_path,
            "GeoIP database not found. Sessions stored with empty geo fields. \
             Point PAGETRACE_GEOIP_PATH at a MaxMind City database to enable lookups."
        );
    }

    let store = Arc::new(MemoryStore::new());

    // Seed a website so the server is usable out of the box.
    if let Some(domain) = cfg.seed_domain.clone() {
        let website = Website::new(&domain, "admin");
        info!(domain, site_id = %website.site_id, "Seeded website");
        store.create_website(website).await?;
    }

    let state = Arc::new(AppState::new(store, cfg.clone()));
    let app = pagetrace_server::app::build_app(Arc::clone(&state));

    let addr = format!("0.0.0.0:{}", cfg.port);
    info!(port = cfg.port, "pagetrace listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
