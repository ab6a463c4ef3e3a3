//! Rendering payload and the HTML page built from it.

use common::{Cluster, Error, Period};
use minijinja::Environment;
use serde::Serialize;
use std::collections::BTreeMap;

const PAGE_NAME: &str = "index.html";
const PAGE_TEMPLATE: &str = include_str!("../static/index.html");

/// Everything the page needs for one period.
#[derive(Debug, Clone, Serialize)]
pub struct RenderPayload {
    /// e.g. "Earthquakes in the past week".
    pub period: String,
    /// Sorted ascending by centroid magnitude.
    pub elements: Vec<Cluster>,
    /// Cluster color → centroid magnitude.
    pub legend: BTreeMap<String, f32>,
}

pub fn build_payload(period: Period, clusters: &[Cluster]) -> RenderPayload {
    let mut elements = clusters.to_vec();
    elements.sort_by(|a, b| a.centroid.magnitude.total_cmp(&b.centroid.magnitude));

    // Fallback colors can repeat; the larger centroid magnitude wins.
    let legend = elements
        .iter()
        .map(|c| (c.color.clone(), c.centroid.magnitude as f32))
        .collect();

    RenderPayload {
        period: format!("Earthquakes in the past {}", period),
        elements,
        legend,
    }
}

pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    pub fn new() -> Result<Self, Error> {
        let mut env = Environment::new();
        env.add_template(PAGE_NAME, PAGE_TEMPLATE)
            .map_err(|e| Error::Render(format!("invalid page template: {}", e)))?;
        Ok(Self { env })
    }

    pub fn render(&self, payload: &RenderPayload) -> Result<String, Error> {
        let page = self
            .env
            .get_template(PAGE_NAME)
            .map_err(|e| Error::Render(e.to_string()))?;
        page.render(payload)
            .map_err(|e| Error::Render(e.to_string()))
    }
}
