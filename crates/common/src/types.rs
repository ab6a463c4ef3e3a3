//! Core domain types shared across all crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::duration::parse_duration;

// ── Events ────────────────────────────────────────────────────────────

/// One seismic observation as reported by the upstream feed.
///
/// Records are never mutated after they leave the feed client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub magnitude: f64,
    /// Depth below the surface in kilometres.
    pub depth_km: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub time: DateTime<Utc>,
    /// Human-readable location, e.g. "10 km SW of Ridgecrest, CA".
    #[serde(default)]
    pub place: String,
    /// Event detail page on the feed provider's site.
    #[serde(default)]
    pub url: String,
}

/// A group of events with similar features, labeled for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub color: String,
    pub centroid: EventRecord,
    pub points: Vec<EventRecord>,
}

// ── Periods ───────────────────────────────────────────────────────────

/// Lookback window offered by the feed; also the cache key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    PastHour,
    PastDay,
    #[default]
    Past7Days,
    Past30Days,
}

impl Period {
    pub const ALL: [Period; 4] = [
        Period::PastHour,
        Period::PastDay,
        Period::Past7Days,
        Period::Past30Days,
    ];

    /// Path component used by the feed (`all_week.geojson`).
    pub fn slug(self) -> &'static str {
        match self {
            Period::PastHour => "hour",
            Period::PastDay => "day",
            Period::Past7Days => "week",
            Period::Past30Days => "month",
        }
    }

    /// Smallest period whose window covers `lookback`.
    pub fn covering(lookback: chrono::Duration) -> Period {
        if lookback <= chrono::Duration::hours(1) {
            Period::PastHour
        } else if lookback <= chrono::Duration::days(1) {
            Period::PastDay
        } else if lookback <= chrono::Duration::days(7) {
            Period::Past7Days
        } else {
            Period::Past30Days
        }
    }

    /// Resolve a requested duration string. Never fails: anything that does
    /// not parse maps to the default period.
    pub fn resolve(raw: &str) -> Period {
        parse_duration(raw)
            .map(Period::covering)
            .unwrap_or_default()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

// ── Magnitude filter ──────────────────────────────────────────────────

/// Minimum-magnitude selector offered by the summary feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MagnitudeFilter {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "1.0")]
    AtLeast1_0,
    #[serde(rename = "2.5")]
    AtLeast2_5,
    #[serde(rename = "4.5")]
    AtLeast4_5,
    #[serde(rename = "significant")]
    Significant,
}

impl MagnitudeFilter {
    pub fn slug(self) -> &'static str {
        match self {
            MagnitudeFilter::All => "all",
            MagnitudeFilter::AtLeast1_0 => "1.0",
            MagnitudeFilter::AtLeast2_5 => "2.5",
            MagnitudeFilter::AtLeast4_5 => "4.5",
            MagnitudeFilter::Significant => "significant",
        }
    }

    pub fn from_slug(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Some(MagnitudeFilter::All),
            "1.0" | "1" => Some(MagnitudeFilter::AtLeast1_0),
            "2.5" => Some(MagnitudeFilter::AtLeast2_5),
            "4.5" => Some(MagnitudeFilter::AtLeast4_5),
            "significant" => Some(MagnitudeFilter::Significant),
            _ => None,
        }
    }
}

impl fmt::Display for MagnitudeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}
