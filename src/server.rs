//! HTTP surface: the visualization page, its JSON payload and a health check.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clustering::Pipeline;
use common::{Error, Period};
use std::sync::Arc;
use tracing::warn;
use usgs_client::EventFeed;

use crate::render::{build_payload, RenderPayload, Renderer};

/// Shared state for all handlers.
pub struct AppState<F> {
    pub pipeline: Pipeline<F>,
    pub renderer: Renderer,
}

/// Raw query pairs, in request order.
pub type QueryPairs = Vec<(String, String)>;

#[derive(Debug, Default)]
pub struct VisualQuery {
    /// Lookback duration such as `"3h"` or `"10d"`.
    pub dur: Option<String>,
}

impl VisualQuery {
    /// The first `dur` wins when the key repeats.
    pub fn from_pairs(pairs: QueryPairs) -> Self {
        let dur = pairs
            .into_iter()
            .find(|(key, _)| key == "dur")
            .map(|(_, value)| value);
        Self { dur }
    }

    /// Missing or unparsable durations fall back to the default period.
    pub fn period(&self) -> Period {
        self.dur.as_deref().map(Period::resolve).unwrap_or_default()
    }
}

/// Pipeline failures are the client's problem to retry; template failures are ours.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            Error::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, self.0.to_string()).into_response()
    }
}

pub fn router<F: EventFeed>(state: Arc<AppState<F>>) -> Router {
    Router::new()
        .route("/visual", get(visual_page::<F>))
        .route("/visual.json", get(visual_json::<F>))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn payload_for<F: EventFeed>(
    state: &AppState<F>,
    pairs: QueryPairs,
) -> Result<RenderPayload, Error> {
    let period = VisualQuery::from_pairs(pairs).period();
    let clusters = state.pipeline.lookup(period).await.inspect_err(|e| {
        warn!(%period, "Lookup failed: {}", e);
    })?;
    Ok(build_payload(period, &clusters))
}

pub async fn visual_page<F: EventFeed>(
    State(state): State<Arc<AppState<F>>>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Html<String>, ApiError> {
    let payload = payload_for(&state, pairs).await?;
    let html = state.renderer.render(&payload).inspect_err(|e| {
        warn!("Rendering failed: {}", e);
    })?;
    Ok(Html(html))
}

pub async fn visual_json<F: EventFeed>(
    State(state): State<Arc<AppState<F>>>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<RenderPayload>, ApiError> {
    Ok(Json(payload_for(&state, pairs).await?))
}

pub async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use clustering::{ClusterCache, PipelineSettings};
    use common::{EventRecord, MagnitudeFilter};
    use std::sync::Mutex;

    /// Records every requested period; fails when `fail` is set.
    struct RecordingFeed {
        fail: bool,
        periods: Mutex<Vec<Period>>,
    }

    #[async_trait]
    impl EventFeed for RecordingFeed {
        async fn fetch(
            &self,
            period: Period,
            _magnitude: MagnitudeFilter,
        ) -> Result<Vec<EventRecord>, Error> {
            if let Ok(mut periods) = self.periods.lock() {
                periods.push(period);
            }
            if self.fail {
                return Err(Error::Feed("feed offline".into()));
            }
            Ok([3.1, 1.2, 5.6, 2.4]
                .iter()
                .enumerate()
                .map(|(i, &magnitude)| EventRecord {
                    id: format!("ev{}", i),
                    magnitude,
                    depth_km: 3.0,
                    latitude: 19.4,
                    longitude: -155.3,
                    time: Utc::now(),
                    place: "Hawaii".into(),
                    url: String::new(),
                })
                .collect())
        }
    }

    fn state(fail: bool) -> (Arc<AppState<RecordingFeed>>, Arc<RecordingFeed>) {
        let feed = Arc::new(RecordingFeed {
            fail,
            periods: Mutex::new(Vec::new()),
        });
        let state = Arc::new(AppState {
            pipeline: Pipeline::new(
                Arc::clone(&feed),
                ClusterCache::new(),
                11,
                PipelineSettings::default(),
            ),
            renderer: Renderer::new().expect("template should compile"),
        });
        (state, feed)
    }

    fn query(dur: Option<&str>) -> Query<QueryPairs> {
        Query(
            dur.map(|d| vec![("dur".to_string(), d.to_string())])
                .unwrap_or_default(),
        )
    }

    fn query_from_uri(uri: &str) -> Query<QueryPairs> {
        let uri: axum::http::Uri = uri.parse().expect("test uri should parse");
        Query::try_from_uri(&uri).expect("query pairs should always extract")
    }

    fn period_of(uri: &str) -> Period {
        VisualQuery::from_pairs(query_from_uri(uri).0).period()
    }

    #[test]
    fn test_query_period() {
        assert_eq!(period_of("/visual"), Period::Past7Days);
        assert_eq!(period_of("/visual?dur=2h"), Period::PastDay);
        assert_eq!(period_of("/visual?dur=bogus"), Period::Past7Days);
        assert_eq!(period_of("/visual?dur"), Period::Past7Days);
        assert_eq!(period_of("/visual?dur=%FF"), Period::Past7Days);
        assert_eq!(period_of("/visual?other=1&dur=45m"), Period::PastHour);
    }

    #[test]
    fn test_repeated_dur_takes_first_value() {
        assert_eq!(period_of("/visual?dur=1h&dur=10d"), Period::PastHour);
        assert_eq!(period_of("/visual?dur=10d&dur=1h"), Period::Past30Days);
    }

    #[tokio::test]
    async fn test_visual_json() {
        let (state, feed) = state(false);

        let Json(payload) = visual_json(State(Arc::clone(&state)), query(Some("3h")))
            .await
            .expect("lookup should succeed");

        assert_eq!(payload.period, "Earthquakes in the past day");
        assert_eq!(payload.elements.len(), 2);
        let mags: Vec<f64> = payload.elements.iter().map(|e| e.centroid.magnitude).collect();
        assert!(mags.windows(2).all(|w| w[0] <= w[1]), "unsorted: {:?}", mags);
        assert_eq!(payload.legend.len(), 2);
        assert_eq!(*feed.periods.lock().unwrap(), vec![Period::PastDay]);
    }

    #[tokio::test]
    async fn test_visual_page_defaults_to_week() {
        let (state, feed) = state(false);

        let Html(html) = visual_page(State(Arc::clone(&state)), query(None))
            .await
            .expect("page should render");

        assert!(html.contains("Earthquakes in the past week"));
        assert_eq!(*feed.periods.lock().unwrap(), vec![Period::Past7Days]);
    }

    #[tokio::test]
    async fn test_repeated_dur_is_served() {
        let (state, feed) = state(false);

        let Json(payload) = visual_json(State(state), query_from_uri("/visual.json?dur=1h&dur=2h"))
            .await
            .expect("repeated dur should not be rejected");

        assert_eq!(payload.period, "Earthquakes in the past hour");
        assert_eq!(*feed.periods.lock().unwrap(), vec![Period::PastHour]);
    }

    #[tokio::test]
    async fn test_pipeline_failure_is_a_client_error() {
        let (state, _feed) = state(true);

        let err = visual_json(State(state), query(Some("10d")))
            .await
            .expect_err("failing feed should surface");

        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_render_error_is_a_server_error() {
        let response = ApiError(Error::Render("boom".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
