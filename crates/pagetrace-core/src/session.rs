use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device class assigned once at collection time from the User-Agent and the
/// reported screen width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceSize {
    Desktop,
    Laptop,
    Tablet,
    Mobile,
}

impl DeviceSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "Desktop",
            Self::Laptop => "Laptop",
            Self::Tablet => "Tablet",
            Self::Mobile => "Mobile",
        }
    }
}

/// One row per (website, browser-tab lifetime).
///
/// Created by the first `page_view` for a `session_id`, then mutated in
/// place: `heartbeat` bumps `last_heartbeat_at`, `page_exit` fills the exit
/// fields. `entry_time` never changes after creation and
/// `last_heartbeat_at` / `active_time_ms` are non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub website_id: String,
    pub visitor_id: String,
    pub session_id: String,
    pub entry_page: String,
    pub entry_time: DateTime<Utc>,
    pub exit_page: Option<String>,
    pub exit_time: Option<DateTime<Utc>>,
    /// Foreground dwell time only; the probe pauses the clock while the tab
    /// is hidden.
    pub active_time_ms: Option<i64>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub referrer: Option<String>,
    pub utm_source: Option<String>,
    pub utm_campaign: Option<String>,
    pub device_size: DeviceSize,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

/// Fields written by a `page_exit` event.
#[derive(Debug, Clone)]
pub struct SessionExit {
    pub exit_page: Option<String>,
    pub exit_time: DateTime<Utc>,
    pub active_time_ms: Option<i64>,
}
