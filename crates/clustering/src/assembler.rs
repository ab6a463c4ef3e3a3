//! Turns a fetch's records into labeled clusters.

use common::{Cluster, Error, EventRecord};
use tracing::debug;

use crate::kmeans::KMeans;
use crate::palette::ColorAllocator;
use crate::vector::EventVector;

/// Upper bound on clusters per run; more groups stop being readable on a map.
pub const MAX_CLUSTERS: usize = 8;

/// Cluster count for `n` vectors: `min(8, n / 2)`.
pub fn cluster_count(n: usize) -> usize {
    (n / 2).min(MAX_CLUSTERS)
}

#[derive(Debug, Clone, Copy)]
pub struct ClusterAssembler {
    seed: u64,
}

impl ClusterAssembler {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Partition `records` and color each partition.
    ///
    /// An empty feed yields no clusters. Errors from the k-means step are
    /// returned as-is.
    pub fn assemble(&self, records: Vec<EventRecord>) -> Result<Vec<Cluster>, Error> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = EventVector::from_records(records);
        let k = cluster_count(vectors.len());
        debug!("Clustering {} events into k={}", vectors.len(), k);

        let partitions = KMeans::new(k, self.seed).partition(vectors)?;

        let mut colors = ColorAllocator::new(self.seed);
        let clusters = partitions
            .into_iter()
            .map(|partition| {
                let (centroid, members) = partition.into_parts();
                let points: Vec<EventRecord> =
                    members.into_iter().map(EventVector::into_record).collect();
                Cluster {
                    color: colors.next_color().to_string(),
                    centroid: points[centroid].clone(),
                    points,
                }
            })
            .collect();

        Ok(clusters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashSet;

    fn make_records(magnitudes: &[f64]) -> Vec<EventRecord> {
        magnitudes
            .iter()
            .enumerate()
            .map(|(i, &magnitude)| EventRecord {
                id: format!("ev{:02}", i),
                magnitude,
                depth_km: 5.0 + i as f64,
                latitude: 34.0 + i as f64 * 0.1,
                longitude: -118.0,
                time: Utc::now(),
                place: String::new(),
                url: String::new(),
            })
            .collect()
    }

    #[test]
    fn test_cluster_count() {
        assert_eq!(cluster_count(0), 0);
        assert_eq!(cluster_count(1), 0);
        assert_eq!(cluster_count(3), 1);
        assert_eq!(cluster_count(10), 5);
        assert_eq!(cluster_count(16), 8);
        assert_eq!(cluster_count(20), 8);
        assert_eq!(cluster_count(10_000), 8);
    }

    #[test]
    fn test_empty_feed_yields_no_clusters() {
        let clusters = ClusterAssembler::new(1).assemble(Vec::new()).unwrap();
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_single_record_yields_trivial_cluster() {
        let records = make_records(&[3.3]);
        let clusters = ClusterAssembler::new(1).assemble(records.clone()).unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].centroid, records[0]);
        assert_eq!(clusters[0].points, records);
    }

    #[test]
    fn test_sixteen_records() {
        let magnitudes: Vec<f64> = (0..16).map(|i| 1.0 + i as f64 / 3.0).collect();
        let clusters = ClusterAssembler::new(2024)
            .assemble(make_records(&magnitudes))
            .unwrap();

        assert!(!clusters.is_empty() && clusters.len() <= MAX_CLUSTERS);
        assert_eq!(clusters.iter().map(|c| c.points.len()).sum::<usize>(), 16);

        let colors: HashSet<&str> = clusters.iter().map(|c| c.color.as_str()).collect();
        assert_eq!(colors.len(), clusters.len(), "colors should be unique");

        for cluster in &clusters {
            assert!(!cluster.points.is_empty());
            let lo = cluster.points.iter().map(|p| p.magnitude).fold(f64::INFINITY, f64::min);
            let hi = cluster
                .points
                .iter()
                .map(|p| p.magnitude)
                .fold(f64::NEG_INFINITY, f64::max);
            let m = cluster.centroid.magnitude;
            assert!(lo <= m && m <= hi, "centroid {} outside [{}, {}]", m, lo, hi);
            assert!(cluster.points.contains(&cluster.centroid));
        }
    }

    #[test]
    fn test_every_record_lands_in_exactly_one_cluster() {
        let records = make_records(&[1.0, 1.2, 2.5, 2.7, 4.0, 4.4, 6.1, 6.3, 0.5, 3.3]);
        let clusters = ClusterAssembler::new(3).assemble(records.clone()).unwrap();

        let mut ids: Vec<&str> = clusters
            .iter()
            .flat_map(|c| c.points.iter().map(|p| p.id.as_str()))
            .collect();
        ids.sort();
        let mut expected: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        expected.sort();
        assert_eq!(ids, expected);
    }
}
