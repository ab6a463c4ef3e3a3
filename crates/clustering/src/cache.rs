//! Expiring per-period cache of assembled clusters.
//!
//! Backed by `DashMap`, so each get/put is atomic without a global lock.
//! Expiry is checked lazily on read; there is no sweeper task.

use common::{Cluster, Period};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cached cluster set with its absolute expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub clusters: Arc<Vec<Cluster>>,
    pub expires_at: Instant,
}

impl CacheEntry {
    /// Expired strictly after `expires_at`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Thread-safe cluster cache keyed by period. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct ClusterCache {
    entries: Arc<DashMap<Period, CacheEntry>>,
}

impl ClusterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, period: Period) -> Option<Arc<Vec<Cluster>>> {
        self.get_at(period, Instant::now())
    }

    /// Live entry for `period` as of `now`. An expired entry is dropped.
    pub fn get_at(&self, period: Period, now: Instant) -> Option<Arc<Vec<Cluster>>> {
        let hit = self
            .entries
            .get(&period)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| Arc::clone(&entry.clusters));

        if hit.is_none() {
            self.entries
                .remove_if(&period, |_, entry| entry.is_expired(now));
        }
        hit
    }

    pub fn put(&self, period: Period, clusters: Arc<Vec<Cluster>>, ttl: Duration) {
        self.put_at(period, clusters, ttl, Instant::now());
    }

    /// Store `clusters` for `period`, replacing whatever was there.
    pub fn put_at(&self, period: Period, clusters: Arc<Vec<Cluster>>, ttl: Duration, now: Instant) {
        let expires_at = now.checked_add(ttl).unwrap_or(now);
        self.entries.insert(
            period,
            CacheEntry {
                clusters,
                expires_at,
            },
        );
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, period: Period) -> bool {
        self.get(period).is_some()
    }
}
