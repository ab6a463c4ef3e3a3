//! Unified error type for quake-viz.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("USGS feed error: {0}")]
    Feed(String),

    #[error("Clustering error: {0}")]
    Clustering(String),

    #[error("Timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("Unsupported dimension {index} (vector has {len})")]
    UnsupportedDimension { index: usize, len: usize },

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
