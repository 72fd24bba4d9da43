//! Read-side aggregation over session rows.
//!
//! Every function here is pure: the server fetches the sessions for one
//! (website, date window) pair and hands the slice over. Distinct-visitor
//! counting is set-backed throughout — a category maps to the set of
//! visitor ids seen in it, materialized to counts only at output time, so a
//! repeat visitor never double-counts.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use url::Url;

use crate::session::Session;

/// Sessions with less than this much recorded active time (or none at all)
/// count as bounces.
pub const BOUNCE_THRESHOLD_MS: i64 = 5_000;

/// A visitor is "live" while its last heartbeat is inside this trailing
/// window. Three missed 10-second probe heartbeats drop it out.
pub const LIVE_WINDOW_SECONDS: i64 = 30;

/// Default query window when no explicit range is supplied: the trailing
/// 30 days (today plus the 29 before it).
pub const DEFAULT_WINDOW_DAYS: i64 = 29;

/// Inclusive query window over `entry_time`, shared by all range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// `[start_of_day(from ?? today - 29d), end_of_day(to ?? today)]`.
    pub fn resolve(from: Option<NaiveDate>, to: Option<NaiveDate>, today: NaiveDate) -> Self {
        let from_day = from.unwrap_or(today - Duration::days(DEFAULT_WINDOW_DAYS));
        let to_day = to.unwrap_or(today);
        Self {
            start: start_of_day(from_day),
            end: end_of_day(to_day),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(0, 0, 0)
        .unwrap_or_else(|| day.and_time(chrono::NaiveTime::MIN))
        .and_utc()
}

fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_milli_opt(23, 59, 59, 999)
        .unwrap_or_else(|| day.and_time(chrono::NaiveTime::MIN))
        .and_utc()
}

/// Category → distinct visitor-id set, remembering first-seen order so that
/// the descending sort keeps encounter order on ties (stable sort, no
/// secondary key).
#[derive(Debug, Default)]
struct VisitorGroups {
    order: Vec<String>,
    members: HashMap<String, HashSet<String>>,
}

impl VisitorGroups {
    fn insert(&mut self, category: &str, visitor_id: &str) {
        if !self.members.contains_key(category) {
            self.order.push(category.to_string());
        }
        self.members
            .entry(category.to_string())
            .or_default()
            .insert(visitor_id.to_string());
    }

    /// Materialize to `(category, distinct visitors)` sorted descending by
    /// visitor count, encounter order preserved on ties.
    fn into_sorted_counts(mut self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = self
            .order
            .drain(..)
            .map(|category| {
                let visitors = self.members.get(&category).map_or(0, HashSet::len);
                (category, visitors)
            })
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }
}

// ---------------------------------------------------------------------------
// Time series + headline metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPoint {
    pub date: String,
    pub unique_visitors: usize,
    pub total_pageviews: usize,
    /// Mean active time in whole seconds over sessions with a recorded
    /// active time; 0 when no session in the bucket has one.
    pub average_active_time: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadlineMetrics {
    pub unique_visitors: usize,
    pub total_pageviews: usize,
    /// Percentage 0–100, rounded. A bounce is a session with no recorded
    /// active time or less than [`BOUNCE_THRESHOLD_MS`] of it.
    pub bounce_rate: i64,
    pub average_active_time: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub chart_data: Vec<DailyPoint>,
    pub metrics: HeadlineMetrics,
}

#[derive(Debug, Default)]
struct DayBucket {
    visitors: HashSet<String>,
    pageviews: usize,
    active_ms: i64,
    active_count: usize,
}

/// Bucket sessions by the UTC calendar day of `entry_time` and compute the
/// per-day series plus whole-window headline metrics.
pub fn summarize(sessions: &[Session]) -> AnalyticsSummary {
    let mut days: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();
    let mut all_visitors: HashSet<&str> = HashSet::new();

    let mut total_active_ms: i64 = 0;
    let mut active_session_count: usize = 0;
    let mut bounce_count: usize = 0;

    for session in sessions {
        let bucket = days.entry(session.entry_time.date_naive()).or_default();
        bucket.visitors.insert(session.visitor_id.clone());
        all_visitors.insert(&session.visitor_id);
        bucket.pageviews += 1;

        if is_bounce(session) {
            bounce_count += 1;
        }
        if let Some(active_ms) = session.active_time_ms {
            bucket.active_ms += active_ms;
            bucket.active_count += 1;
            total_active_ms += active_ms;
            active_session_count += 1;
        }
    }

    let chart_data = days
        .into_iter()
        .map(|(date, bucket)| DailyPoint {
            date: date.to_string(),
            unique_visitors: bucket.visitors.len(),
            total_pageviews: bucket.pageviews,
            average_active_time: mean_seconds(bucket.active_ms, bucket.active_count),
        })
        .collect();

    let bounce_rate = if sessions.is_empty() {
        0
    } else {
        ((bounce_count as f64 / sessions.len() as f64) * 100.0).round() as i64
    };

    AnalyticsSummary {
        chart_data,
        metrics: HeadlineMetrics {
            unique_visitors: all_visitors.len(),
            total_pageviews: sessions.len(),
            bounce_rate,
            average_active_time: mean_seconds(total_active_ms, active_session_count),
        },
    }
}

fn is_bounce(session: &Session) -> bool {
    match session.active_time_ms {
        None => true,
        Some(active_ms) => active_ms < BOUNCE_THRESHOLD_MS,
    }
}

fn mean_seconds(total_ms: i64, count: usize) -> i64 {
    if count == 0 {
        return 0;
    }
    (total_ms as f64 / count as f64 / 1000.0).round() as i64
}

// ---------------------------------------------------------------------------
// Geography
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CountryStat {
    pub name: String,
    pub code: String,
    pub visitors: usize,
    /// Normalized intensity 0–100 relative to the busiest country, for map
    /// shading.
    pub val: i64,
}

/// Group sessions with a known country by country name. Sessions with no
/// country are excluded here only — they still count everywhere else.
pub fn locations(sessions: &[Session]) -> Vec<CountryStat> {
    let mut groups = VisitorGroups::default();
    let mut codes: HashMap<&str, &str> = HashMap::new();

    for session in sessions {
        let country = match session.country.as_deref() {
            Some(country) if !country.is_empty() => country,
            _ => continue,
        };
        groups.insert(country, &session.visitor_id);
        // Keep the first non-empty code seen for the country.
        if let Some(code) = session.country_code.as_deref() {
            if !code.is_empty() {
                codes.entry(country).or_insert(code);
            }
        }
    }

    let counts = groups.into_sorted_counts();
    let max_visitors = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);

    counts
        .into_iter()
        .map(|(name, visitors)| {
            let val = if max_visitors > 0 {
                ((visitors as f64 / max_visitors as f64) * 100.0).round() as i64
            } else {
                0
            };
            let code = codes.get(name.as_str()).copied().unwrap_or("").to_string();
            CountryStat {
                name,
                code,
                visitors,
                val,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Device / browser / OS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct VisitorCount {
    pub name: String,
    pub visitors: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceBreakdown {
    pub devices_size: Vec<VisitorCount>,
    pub browsers: Vec<VisitorCount>,
    pub operating_systems: Vec<VisitorCount>,
}

/// Three independent distinct-visitor groupings over the same session set,
/// each defaulting an absent value to "Unknown".
pub fn devices(sessions: &[Session]) -> DeviceBreakdown {
    let mut by_device = VisitorGroups::default();
    let mut by_browser = VisitorGroups::default();
    let mut by_os = VisitorGroups::default();

    for session in sessions {
        by_device.insert(session.device_size.as_str(), &session.visitor_id);
        by_browser.insert(or_unknown(session.browser.as_deref()), &session.visitor_id);
        by_os.insert(or_unknown(session.os.as_deref()), &session.visitor_id);
    }

    DeviceBreakdown {
        devices_size: to_visitor_counts(by_device),
        browsers: to_visitor_counts(by_browser),
        operating_systems: to_visitor_counts(by_os),
    }
}

fn or_unknown(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => "Unknown",
    }
}

fn to_visitor_counts(groups: VisitorGroups) -> Vec<VisitorCount> {
    groups
        .into_sorted_counts()
        .into_iter()
        .map(|(name, visitors)| VisitorCount { name, visitors })
        .collect()
}

// ---------------------------------------------------------------------------
// Referrer sources
// ---------------------------------------------------------------------------

pub const DIRECT_SOURCE: &str = "Direct / None";

/// Source label for a referrer value: the hostname with a leading "www."
/// stripped, or [`DIRECT_SOURCE`] when the referrer is absent or not a
/// parseable URL. Malformed referrers collapse into the direct bucket
/// rather than surfacing as errors.
pub fn referrer_source(referrer: Option<&str>) -> String {
    let Some(raw) = referrer.filter(|r| !r.is_empty()) else {
        return DIRECT_SOURCE.to_string();
    };
    match Url::parse(raw).ok().and_then(|url| {
        url.host_str()
            .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
    }) {
        Some(host) => host,
        None => DIRECT_SOURCE.to_string(),
    }
}

/// Distinct visitors per referrer source, sorted descending.
pub fn sources(sessions: &[Session]) -> Vec<VisitorCount> {
    let mut groups = VisitorGroups::default();
    for session in sessions {
        let source = referrer_source(session.referrer.as_deref());
        groups.insert(&source, &session.visitor_id);
    }
    to_visitor_counts(groups)
}

// ---------------------------------------------------------------------------
// Entry / exit pages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PageCount {
    pub path: String,
    pub visitors: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageBreakdown {
    pub entry_pages: Vec<PageCount>,
    pub exit_pages: Vec<PageCount>,
}

/// Path component of a page URL, defaulting to "/" when the value does not
/// parse or the path is empty.
pub fn page_path(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) if !url.path().is_empty() => url.path().to_string(),
        _ => "/".to_string(),
    }
}

/// Independent distinct-visitor groupings of entry and exit page paths,
/// each sorted descending. Sessions without an exit page only contribute
/// to the entry grouping.
pub fn pages(sessions: &[Session]) -> PageBreakdown {
    let mut entries = VisitorGroups::default();
    let mut exits = VisitorGroups::default();

    for session in sessions {
        if !session.entry_page.is_empty() {
            entries.insert(&page_path(&session.entry_page), &session.visitor_id);
        }
        if let Some(exit_page) = session.exit_page.as_deref() {
            if !exit_page.is_empty() {
                exits.insert(&page_path(exit_page), &session.visitor_id);
            }
        }
    }

    PageBreakdown {
        entry_pages: to_page_counts(entries),
        exit_pages: to_page_counts(exits),
    }
}

fn to_page_counts(groups: VisitorGroups) -> Vec<PageCount> {
    groups
        .into_sorted_counts()
        .into_iter()
        .map(|(path, visitors)| PageCount { path, visitors })
        .collect()
}

// ---------------------------------------------------------------------------
// Live visitors
// ---------------------------------------------------------------------------

/// Distinct visitors among sessions already filtered to the trailing
/// heartbeat window. A visitor with several live tabs counts once.
pub fn live_visitors(sessions: &[Session]) -> usize {
    sessions
        .iter()
        .map(|session| session.visitor_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}
