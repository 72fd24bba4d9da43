//! In-memory keyed-record backend.
//!
//! Sessions live in a single map keyed by `session_id` behind one async
//! `RwLock`; every mutation takes the write lock for its whole
//! read-then-write step, which makes `create_session` the atomic
//! create-or-touch the collector relies on under concurrent page_view
//! sends.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use pagetrace_core::session::{Session, SessionExit};

use crate::{SessionStore, Website, WebsiteStore};

#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Session>>,
    websites: RwLock<Vec<Website>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find_session(&self, session_id: &str) -> anyhow::Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn create_session(&self, session: Session) -> anyhow::Result<bool> {
        let mut sessions = self.sessions.write().await;
        match sessions.entry(session.session_id.clone()) {
            std::collections::hash_map::Entry::Occupied(mut existing) => {
                let row = existing.get_mut();
                // Duplicate page_view: entry fields are immutable, only the
                // heartbeat moves (and never backwards).
                row.last_heartbeat_at = row.last_heartbeat_at.max(session.last_heartbeat_at);
                Ok(false)
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(true)
            }
        }
    }

    async fn touch_heartbeat(&self, session_id: &str, at: DateTime<Utc>) -> anyhow::Result<bool> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(row) => {
                row.last_heartbeat_at = row.last_heartbeat_at.max(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_exit(&self, session_id: &str, exit: SessionExit) -> anyhow::Result<bool> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(row) => {
                row.exit_page = exit.exit_page.or(row.exit_page.take());
                row.exit_time = Some(exit.exit_time);
                if let Some(active_ms) = exit.active_time_ms {
                    // Non-decreasing once set; a replayed exit beacon with a
                    // smaller value is ignored.
                    row.active_time_ms = Some(row.active_time_ms.unwrap_or(0).max(active_ms));
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn sessions_in_window(
        &self,
        website_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|s| s.website_id == website_id && s.entry_time >= from && s.entry_time <= to)
            .cloned()
            .collect())
    }

    async fn sessions_active_since(
        &self,
        website_id: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|s| s.website_id == website_id && s.last_heartbeat_at >= since)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl WebsiteStore for MemoryStore {
    async fn find_website(
        &self,
        domain: &str,
        site_id: &str,
    ) -> anyhow::Result<Option<Website>> {
        let websites = self.websites.read().await;
        Ok(websites
            .iter()
            .find(|w| w.domain == domain && w.site_id == site_id)
            .cloned())
    }

    async fn find_website_by_domain(&self, domain: &str) -> anyhow::Result<Option<Website>> {
        let websites = self.websites.read().await;
        Ok(websites.iter().find(|w| w.domain == domain).cloned())
    }

    async fn get_website(&self, id: &str) -> anyhow::Result<Option<Website>> {
        let websites = self.websites.read().await;
        Ok(websites.iter().find(|w| w.id == id).cloned())
    }

    async fn create_website(&self, website: Website) -> anyhow::Result<()> {
        let mut websites = self.websites.write().await;
        websites.push(website);
        Ok(())
    }

    async fn list_websites(&self) -> anyhow::Result<Vec<Website>> {
        let websites = self.websites.read().await;
        let mut list = websites.clone();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn delete_website(&self, id: &str) -> anyhow::Result<bool> {
        let mut websites = self.websites.write().await;
        let before = websites.len();
        websites.retain(|w| w.id != id);
        Ok(websites.len() != before)
    }
}
