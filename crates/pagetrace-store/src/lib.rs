//! Storage contracts for session and website records.
//!
//! The collector and the aggregation routes only ever touch storage through
//! these traits, so the keyed-record backend can be swapped without touching
//! the handlers. [`MemoryStore`] is the bundled implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use pagetrace_core::session::{Session, SessionExit};

pub mod memory;

pub use memory::MemoryStore;

#[derive(Debug, Clone, Serialize)]
pub struct Website {
    pub id: String,
    pub domain: String,
    /// Public token carried by the embed snippet, e.g. `P-9F2KQ...`.
    pub site_id: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

impl Website {
    pub fn new(domain: &str, owner: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            domain: domain.to_string(),
            site_id: generate_site_token(),
            owner: owner.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Generate a public site token: "P-" + 21 random upper-alphanumeric chars.
fn generate_site_token() -> String {
    use rand::Rng;
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    let token: String = (0..21)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("P-{token}")
}

/// One durable row per session, keyed by `session_id`.
///
/// `create_session` is the idempotence seam: it must atomically either
/// insert the row or, when one already exists for the key, bump its
/// `last_heartbeat_at` — so a duplicate or racing `page_view` degenerates
/// to the heartbeat path instead of erroring or double-inserting.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn find_session(&self, session_id: &str) -> anyhow::Result<Option<Session>>;

    /// Insert-or-touch keyed by `session_id`. Returns `true` when a new row
    /// was created, `false` when an existing row had its heartbeat bumped.
    async fn create_session(&self, session: Session) -> anyhow::Result<bool>;

    /// Bump `last_heartbeat_at` (monotonically). Returns `false` when no
    /// row matches — callers treat that as a silent no-op.
    async fn touch_heartbeat(&self, session_id: &str, at: DateTime<Utc>) -> anyhow::Result<bool>;

    /// Record the exit fields. Returns `false` when no row matches.
    async fn record_exit(&self, session_id: &str, exit: SessionExit) -> anyhow::Result<bool>;

    /// Sessions for a website with `entry_time` in the inclusive window.
    async fn sessions_in_window(
        &self,
        website_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Session>>;

    /// Sessions for a website with `last_heartbeat_at` at or after `since`.
    async fn sessions_active_since(
        &self,
        website_id: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Session>>;
}

/// Website registry. Provisioning is thin CRUD; the collector only reads it
/// via `find_website` to resolve a session's owner.
#[async_trait]
pub trait WebsiteStore: Send + Sync + 'static {
    /// Resolve by (domain, public site token) — the collector's guard
    /// against spoofed or stale snippets.
    async fn find_website(&self, domain: &str, site_id: &str)
        -> anyhow::Result<Option<Website>>;
    async fn find_website_by_domain(&self, domain: &str) -> anyhow::Result<Option<Website>>;
    async fn get_website(&self, id: &str) -> anyhow::Result<Option<Website>>;
    async fn create_website(&self, website: Website) -> anyhow::Result<()>;
    /// Newest first.
    async fn list_websites(&self) -> anyhow::Result<Vec<Website>>;
    async fn delete_website(&self, id: &str) -> anyhow::Result<bool>;
}
