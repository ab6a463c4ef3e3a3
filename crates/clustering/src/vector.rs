//! Clustering view over an event record.

use common::{Error, EventRecord};
use std::sync::OnceLock;

/// Number of features each vector exposes in this build.
#[cfg(not(feature = "depth"))]
pub const DIMENSIONS: usize = 1;
#[cfg(feature = "depth")]
pub const DIMENSIONS: usize = 2;

/// Anything the k-means primitive can partition.
pub trait Vector {
    /// Stable identity of the underlying item.
    fn signature(&self) -> &str;

    /// Number of numeric features.
    fn len(&self) -> usize;

    /// The `index`-th feature.
    fn dimension(&self, index: usize) -> Result<f64, Error>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All features in order.
    fn features(&self) -> Result<Vec<f64>, Error> {
        (0..self.len()).map(|i| self.dimension(i)).collect()
    }
}

/// An event record wrapped for clustering on magnitude (and depth with the
/// `depth` feature).
#[derive(Debug, Clone)]
pub struct EventVector {
    record: EventRecord,
    signature: OnceLock<String>,
}

impl EventVector {
    pub fn new(record: EventRecord) -> Self {
        Self {
            record,
            signature: OnceLock::new(),
        }
    }

    pub fn from_records(records: Vec<EventRecord>) -> Vec<Self> {
        records.into_iter().map(Self::new).collect()
    }

    pub fn into_record(self) -> EventRecord {
        self.record
    }
}

impl Vector for EventVector {
    fn signature(&self) -> &str {
        self.signature.get_or_init(|| {
            format!(
                "{:.6}-{:.6}-{:.6}-{:.6}",
                self.record.latitude,
                self.record.longitude,
                self.record.depth_km,
                self.record.magnitude
            )
        })
    }

    fn len(&self) -> usize {
        DIMENSIONS
    }

    fn dimension(&self, index: usize) -> Result<f64, Error> {
        match index {
            0 => Ok(self.record.magnitude),
            #[cfg(feature = "depth")]
            1 => Ok(self.record.depth_km),
            _ => Err(Error::UnsupportedDimension {
                index,
                len: DIMENSIONS,
            }),
        }
    }
}
