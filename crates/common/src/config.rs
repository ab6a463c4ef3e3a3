//! Service configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{MagnitudeFilter, Period};

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream event feed settings.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Fetch/cluster pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Result cache lifetimes per period.
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Base URL of the GeoJSON summary feed, without trailing slash.
    #[serde(default = "default_feed_url")]
    pub base_url: String,

    /// Minimum magnitude requested from the feed.
    #[serde(default)]
    pub magnitude: MagnitudeFilter,

    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Deadline for a full fetch + cluster run on a cache miss.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,

    /// Let only one miss per period run at a time; others wait for its result.
    #[serde(default = "default_true")]
    pub coalesce_misses: bool,
}

impl PipelineConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Time-to-live of a cached cluster set, per period (seconds).
///
/// Longer windows change more slowly, so they tolerate longer lifetimes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_hour")]
    pub past_hour_secs: u64,
    #[serde(default = "default_ttl_day")]
    pub past_day_secs: u64,
    #[serde(default = "default_ttl_week")]
    pub past_7_days_secs: u64,
    #[serde(default = "default_ttl_month")]
    pub past_30_days_secs: u64,
}

impl CacheConfig {
    pub fn ttl_for(&self, period: Period) -> Duration {
        let secs = match period {
            Period::PastHour => self.past_hour_secs,
            Period::PastDay => self.past_day_secs,
            Period::Past7Days => self.past_7_days_secs,
            Period::Past30Days => self.past_30_days_secs,
        };
        Duration::from_secs(secs)
    }
}

// ── Defaults ──────────────────────────────────────────────────────────

const HOUR_SECS: u64 = 60 * 60;
const DAY_SECS: u64 = 24 * HOUR_SECS;

fn default_true() -> bool {
    true
}

fn default_bind_addr() -> String {
    "0.0.0.0:8888".into()
}

fn default_feed_url() -> String {
    "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary".into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("quake-viz/", env!("CARGO_PKG_VERSION")).into()
}

fn default_deadline_ms() -> u64 {
    30_000
}

fn default_ttl_hour() -> u64 {
    HOUR_SECS
}
fn default_ttl_day() -> u64 {
    6 * HOUR_SECS
}
fn default_ttl_week() -> u64 {
    DAY_SECS
}
fn default_ttl_month() -> u64 {
    // A sliding one-day window; the 30-day view barely moves within a day.
    DAY_SECS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_feed_url(),
            magnitude: MagnitudeFilter::default(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            coalesce_misses: default_true(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            past_hour_secs: default_ttl_hour(),
            past_day_secs: default_ttl_day(),
            past_7_days_secs: default_ttl_week(),
            past_30_days_secs: default_ttl_month(),
        }
    }
}
