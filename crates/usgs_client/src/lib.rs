//! USGS earthquake feed client.
//!
//! Fetches the GeoJSON summary feeds from `earthquake.usgs.gov` and converts
//! their features into [`EventRecord`]s for the clustering pipeline.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use common::config::FeedConfig;
use common::{Error, EventRecord, MagnitudeFilter, Period};
use serde::Deserialize;
use tracing::debug;

/// Source of raw event records for a recency period.
///
/// The pipeline only talks to the feed through this trait, so tests can
/// substitute a double.
#[async_trait]
pub trait EventFeed: Send + Sync + 'static {
    async fn fetch(
        &self,
        period: Period,
        magnitude: MagnitudeFilter,
    ) -> Result<Vec<EventRecord>, Error>;
}

/// USGS summary feed client with connection pooling and User-Agent header.
#[derive(Debug, Clone)]
pub struct UsgsClient {
    client: reqwest::Client,
    base_url: String,
}

// ── USGS response types ───────────────────────────────────────────────

/// Summary feed body, e.g. `/all_week.geojson`.
#[derive(Debug, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub metadata: Option<FeedMetadata>,
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
pub struct FeedMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct Feature {
    pub id: String,
    pub properties: FeatureProperties,
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
pub struct FeatureProperties {
    /// Null for events the network has not sized yet.
    pub mag: Option<f64>,
    #[serde(default)]
    pub place: Option<String>,
    /// Origin time in milliseconds since the epoch.
    pub time: i64,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Geometry {
    /// `[longitude, latitude, depth_km]`.
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

impl Feature {
    /// Convert to an [`EventRecord`]; `None` if magnitude or position is missing.
    pub fn into_record(self) -> Option<EventRecord> {
        let magnitude = self.properties.mag?;
        let coords = self.geometry?.coordinates;
        let position: [f64; 3] = coords.get(..3)?.try_into().ok()?;
        let [longitude, latitude, depth_km] = position;
        let time: DateTime<Utc> = Utc.timestamp_millis_opt(self.properties.time).single()?;

        Some(EventRecord {
            id: self.id,
            magnitude,
            depth_km,
            latitude,
            longitude,
            time,
            place: self.properties.place.unwrap_or_default(),
            url: self.properties.url.unwrap_or_default(),
        })
    }
}

/// Keep the features that carry enough data to be clustered.
pub fn collect_records(collection: FeatureCollection) -> Vec<EventRecord> {
    let total = collection.features.len();
    let records: Vec<EventRecord> = collection
        .features
        .into_iter()
        .filter_map(|feature| {
            let id = feature.id.clone();
            let record = feature.into_record();
            if record.is_none() {
                debug!("Skipping feature {} without magnitude or coordinates", id);
            }
            record
        })
        .collect();

    if records.len() < total {
        debug!("Kept {} / {} features", records.len(), total);
    }
    records
}

// ── Implementation ────────────────────────────────────────────────────

/// Longest slice of an error body carried into `Error::Feed`.
const MAX_ERROR_BODY_CHARS: usize = 500;

fn status_error(status: u16, url: &str, body: &str) -> Error {
    let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    Error::Feed(format!("USGS returned {} for {}: {}", status, url, body))
}

impl UsgsClient {
    pub fn new(cfg: &FeedConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .pool_max_idle_per_host(4)
            .timeout(std::time::Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| Error::Http(format!("failed to build USGS HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Summary feed URL for a period and magnitude filter.
    pub fn feed_url(&self, period: Period, magnitude: MagnitudeFilter) -> String {
        format!(
            "{}/{}_{}.geojson",
            self.base_url,
            magnitude.slug(),
            period.slug()
        )
    }

    /// Fetch the raw feature collection.
    pub async fn fetch_collection(
        &self,
        period: Period,
        magnitude: MagnitudeFilter,
    ) -> Result<FeatureCollection, Error> {
        let url = self.feed_url(period, magnitude);

        debug!("Fetching USGS feed: {}", url);

        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/geo+json")
            .send()
            .await
            .map_err(|e| Error::Feed(format!("HTTP error for {}: {}", url, e)))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &url, &body));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Feed(format!("failed to read body from {}: {}", url, e)))?;
        let collection: FeatureCollection = serde_json::from_str(&body)?;

        if let Some(meta) = &collection.metadata {
            debug!("{}: {} features", meta.title, meta.count);
        }

        Ok(collection)
    }
}

#[async_trait]
impl EventFeed for UsgsClient {
    async fn fetch(
        &self,
        period: Period,
        magnitude: MagnitudeFilter,
    ) -> Result<Vec<EventRecord>, Error> {
        let collection = self.fetch_collection(period, magnitude).await?;
        Ok(collect_records(collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_feed() -> &'static str {
        r#"{
            "type": "FeatureCollection",
            "metadata": {"title": "USGS All Earthquakes, Past Hour", "count": 3},
            "features": [
                {
                    "type": "Feature",
                    "id": "ci40000001",
                    "properties": {
                        "mag": 2.31,
                        "place": "10 km SW of Ridgecrest, CA",
                        "time": 1760900000000,
                        "url": "https://earthquake.usgs.gov/earthquakes/eventpage/ci40000001"
                    },
                    "geometry": {"type": "Point", "coordinates": [-117.75, 35.56, 8.2]}
                },
                {
                    "type": "Feature",
                    "id": "ak0001",
                    "properties": {"mag": null, "place": "Alaska", "time": 1760900001000},
                    "geometry": {"type": "Point", "coordinates": [-150.1, 61.2, 40.0]}
                },
                {
                    "type": "Feature",
                    "id": "us0002",
                    "properties": {"mag": 4.9, "place": null, "time": 1760900002000, "url": null},
                    "geometry": {"type": "Point", "coordinates": [142.3, 38.1]}
                }
            ]
        }"#
    }

    #[test]
    fn test_deserialize_feed() {
        let parsed: FeatureCollection =
            serde_json::from_str(sample_feed()).expect("feed should deserialize");

        assert_eq!(parsed.features.len(), 3);
        assert_eq!(parsed.metadata.map(|m| m.count), Some(3));
    }

    #[test]
    fn test_collect_records_skips_incomplete_features() {
        let parsed: FeatureCollection =
            serde_json::from_str(sample_feed()).expect("feed should deserialize");

        let records = collect_records(parsed);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id, "ci40000001");
        assert!((record.magnitude - 2.31).abs() < 1e-9);
        assert!((record.longitude + 117.75).abs() < 1e-9);
        assert!((record.latitude - 35.56).abs() < 1e-9);
        assert!((record.depth_km - 8.2).abs() < 1e-9);
        assert_eq!(record.time.timestamp_millis(), 1_760_900_000_000);
        assert_eq!(record.place, "10 km SW of Ridgecrest, CA");
    }

    #[test]
    fn test_status_error_truncates_body() {
        let body = "é".repeat(MAX_ERROR_BODY_CHARS + 20);
        match status_error(503, "https://feeds.example.test/all_day.geojson", &body) {
            Error::Feed(msg) => {
                assert!(msg.starts_with("USGS returned 503 for https://feeds.example.test/"));
                assert_eq!(msg.matches('é').count(), MAX_ERROR_BODY_CHARS);
            }
            other => panic!("expected feed error, got {:?}", other),
        }
    }

    #[test]
    fn test_status_error_keeps_short_body() {
        match status_error(404, "u", "not found") {
            Error::Feed(msg) => assert_eq!(msg, "USGS returned 404 for u: not found"),
            other => panic!("expected feed error, got {:?}", other),
        }
    }

    /// Serve one canned HTTP response on a local port and return its base URL.
    async fn serve_once(response: String) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind local port");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        )
    }

    #[tokio::test]
    async fn test_non_200_maps_to_feed_error() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS + 100);
        let base_url = serve_once(http_response("503 Service Unavailable", &body)).await;
        let client = UsgsClient::new(&FeedConfig {
            base_url,
            ..FeedConfig::default()
        })
        .expect("client should build");

        match client.fetch(Period::PastHour, MagnitudeFilter::All).await {
            Err(Error::Feed(msg)) => {
                assert!(msg.contains("503"), "{msg}");
                assert!(msg.contains("/all_hour.geojson"), "{msg}");
                assert_eq!(msg.matches('x').count(), MAX_ERROR_BODY_CHARS);
            }
            other => panic!("expected feed error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_maps_to_json_error() {
        let base_url = serve_once(http_response("200 OK", "{not json")).await;
        let client = UsgsClient::new(&FeedConfig {
            base_url,
            ..FeedConfig::default()
        })
        .expect("client should build");

        let result = client.fetch(Period::PastDay, MagnitudeFilter::All).await;
        assert!(matches!(result, Err(Error::Json(_))), "{:?}", result.err());
    }

    #[test]
    fn test_feed_url() {
        let cfg = FeedConfig {
            base_url: "https://feeds.example.test/summary/".into(),
            ..FeedConfig::default()
        };
        let client = UsgsClient::new(&cfg).expect("client should build");

        assert_eq!(
            client.feed_url(Period::Past7Days, MagnitudeFilter::All),
            "https://feeds.example.test/summary/all_week.geojson"
        );
        assert_eq!(
            client.feed_url(Period::PastHour, MagnitudeFilter::AtLeast2_5),
            "https://feeds.example.test/summary/2.5_hour.geojson"
        );
    }
}
