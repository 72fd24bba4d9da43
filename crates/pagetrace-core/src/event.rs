use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

/// Lifecycle events emitted by the browser probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    PageView,
    Heartbeat,
    PageExit,
}

impl EventType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "page_view" => Some(Self::PageView),
            "heartbeat" => Some(Self::Heartbeat),
            "page_exit" => Some(Self::PageExit),
            _ => None,
        }
    }
}

/// The payload the probe sends to POST /api/collect.
///
/// Every field is optional at the wire level; the collector validates the
/// required ones and rejects with 400 rather than letting deserialization
/// produce an opaque error for the embedding page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectPayload {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub domain: Option<String>,
    #[serde(rename = "siteId")]
    pub site_id: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
    #[serde(rename = "visitorId")]
    pub visitor_id: Option<String>,
    #[serde(rename = "userAgent")]
    pub user_agent: Option<String>,
    pub url: Option<String>,
    pub referrer: Option<String>,
    #[serde(rename = "screenWidth")]
    pub screen_width: Option<u32>,
    /// Client clock, milliseconds since the Unix epoch.
    pub timestamp: Option<i64>,
    /// Accumulated foreground time in milliseconds, sent with `page_exit`.
    pub active_time: Option<i64>,
    pub utm_source: Option<String>,
    pub utm_campaign: Option<String>,
}

impl CollectPayload {
    /// Event timestamp as UTC, falling back to the collector clock when the
    /// client value is absent or not representable.
    pub fn event_time(&self) -> DateTime<Utc> {
        self.timestamp
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now)
    }
}
