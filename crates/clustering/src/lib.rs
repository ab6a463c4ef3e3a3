//! Clustering pipeline crate.
//!
//! Turns raw event records into colored clusters, caches them per period and
//! bounds each miss with a deadline.

pub mod assembler;
pub mod cache;
pub mod kmeans;
pub mod palette;
pub mod pipeline;
pub mod vector;

pub use assembler::{cluster_count, ClusterAssembler, MAX_CLUSTERS};
pub use cache::{CacheEntry, ClusterCache};
pub use kmeans::{KMeans, Partition};
pub use palette::{ColorAllocator, FALLBACK_COLOR, PALETTE};
pub use pipeline::{Pipeline, PipelineSettings, Stage};
pub use vector::{EventVector, Vector, DIMENSIONS};

/// Process-wide seed for cluster initialization and color picks.
///
/// Taken once at startup from the wall clock and handed to the pipeline.
pub fn seed_from_clock() -> u64 {
    let now = chrono::Utc::now();
    now.timestamp_nanos_opt()
        .map(|nanos| nanos as u64)
        .unwrap_or_else(|| now.timestamp_micros() as u64)
}
