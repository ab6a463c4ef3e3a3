//! Seeded k-means over [`Vector`]s.
//!
//! Initialization is k-means++ driven by a seeded `StdRng`, so a given seed
//! and input always produce the same partitions. Each partition is represented
//! by the member closest to the partition mean, which keeps the representative
//! a real record instead of a synthetic point.

use common::Error;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::vector::Vector;

pub const DEFAULT_MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct KMeans {
    /// Target number of partitions. Values of 0 and 1 both yield one partition.
    pub k: usize,
    pub seed: u64,
    pub max_iterations: usize,
}

/// One group of vectors and the index of its representative member.
#[derive(Debug)]
pub struct Partition<V> {
    centroid: usize,
    members: Vec<V>,
}

impl<V> Partition<V> {
    pub fn centroid(&self) -> &V {
        &self.members[self.centroid]
    }

    pub fn members(&self) -> &[V] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Position of the representative within `members`, and the members.
    pub fn into_parts(self) -> (usize, Vec<V>) {
        (self.centroid, self.members)
    }
}

impl KMeans {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            seed,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Partition `vectors` into at most `k` non-empty groups.
    pub fn partition<V: Vector>(&self, vectors: Vec<V>) -> Result<Vec<Partition<V>>, Error> {
        if vectors.is_empty() {
            return Err(Error::Clustering("no vectors to partition".into()));
        }
        if self.k > vectors.len() {
            return Err(Error::Clustering(format!(
                "k={} exceeds the {} available vectors",
                self.k,
                vectors.len()
            )));
        }

        let points = vectors
            .iter()
            .map(|v| v.features())
            .collect::<Result<Vec<_>, _>>()?;

        let (groups, assignments) = if self.k <= 1 {
            (1, vec![0; points.len()])
        } else {
            let mut rng = StdRng::seed_from_u64(self.seed);
            let centers = seed_centers(&points, self.k, &mut rng);
            (self.k, lloyd(&points, centers, self.max_iterations))
        };

        Ok(group(vectors, &points, &assignments, groups))
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(point: &[f64], centers: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, center) in centers.iter().enumerate() {
        let d = squared_distance(point, center);
        if d < best_distance {
            best = i;
            best_distance = d;
        }
    }
    best
}

/// k-means++: each further center is drawn with probability proportional to
/// its squared distance from the closest center chosen so far.
fn seed_centers(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..points.len())].clone());

    let mut weights: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centers[0]))
        .collect();

    while centers.len() < k {
        let total: f64 = weights.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = None;
            let mut last_positive = 0;
            for (i, &w) in weights.iter().enumerate() {
                if w <= 0.0 {
                    continue;
                }
                last_positive = i;
                if target < w {
                    chosen = Some(i);
                    break;
                }
                target -= w;
            }
            chosen.unwrap_or(last_positive)
        } else {
            // Every point already coincides with a center.
            rng.gen_range(0..points.len())
        };

        let center = points[next].clone();
        for (w, p) in weights.iter_mut().zip(points) {
            *w = w.min(squared_distance(p, &center));
        }
        centers.push(center);
    }

    centers
}

fn lloyd(points: &[Vec<f64>], mut centers: Vec<Vec<f64>>, max_iterations: usize) -> Vec<usize> {
    let mut assignments: Vec<usize> = points.iter().map(|p| nearest(p, &centers)).collect();

    for _ in 0..max_iterations {
        update_centers(points, &assignments, &mut centers);
        let next: Vec<usize> = points.iter().map(|p| nearest(p, &centers)).collect();
        if next == assignments {
            break;
        }
        assignments = next;
    }

    assignments
}

/// Move each center to the mean of its points; empty centers stay put.
fn update_centers(points: &[Vec<f64>], assignments: &[usize], centers: &mut [Vec<f64>]) {
    let dims = centers.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0.0; dims]; centers.len()];
    let mut counts = vec![0usize; centers.len()];

    for (point, &a) in points.iter().zip(assignments) {
        counts[a] += 1;
        for (s, x) in sums[a].iter_mut().zip(point) {
            *s += x;
        }
    }

    for ((center, sum), count) in centers.iter_mut().zip(sums).zip(counts) {
        if count > 0 {
            *center = sum.into_iter().map(|s| s / count as f64).collect();
        }
    }
}

/// Position within `indices` of the point nearest the group mean. Ties go to
/// the smaller signature so the choice does not depend on input order.
fn medoid_position<V: Vector>(indices: &[usize], points: &[Vec<f64>], vectors: &[V]) -> usize {
    let dims = points.first().map_or(0, Vec::len);
    let mut mean = vec![0.0; dims];
    for &i in indices {
        for (m, x) in mean.iter_mut().zip(&points[i]) {
            *m += x;
        }
    }
    for m in mean.iter_mut() {
        *m /= indices.len() as f64;
    }

    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (pos, &i) in indices.iter().enumerate() {
        let d = squared_distance(&points[i], &mean);
        let closer = d < best_distance;
        let tied = d == best_distance
            && vectors[i].signature() < vectors[indices[best]].signature();
        if closer || tied {
            best = pos;
            best_distance = d;
        }
    }
    best
}

fn group<V: Vector>(
    vectors: Vec<V>,
    points: &[Vec<f64>],
    assignments: &[usize],
    groups: usize,
) -> Vec<Partition<V>> {
    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); groups];
    for (i, &a) in assignments.iter().enumerate() {
        buckets[a].push(i);
    }
    buckets.retain(|b| !b.is_empty());

    let centroids: Vec<usize> = buckets
        .iter()
        .map(|indices| medoid_position(indices, points, &vectors))
        .collect();

    let mut slots: Vec<Option<V>> = vectors.into_iter().map(Some).collect();
    buckets
        .into_iter()
        .zip(centroids)
        .map(|(indices, centroid)| Partition {
            centroid,
            members: indices.iter().filter_map(|&i| slots[i].take()).collect(),
        })
        .collect()
}
