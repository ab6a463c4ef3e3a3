//! Bounded fetch → cluster → cache orchestration.
//!
//! A lookup first consults the [`ClusterCache`]. On a miss the whole fill
//! (wait for the per-period in-flight guard, fetch, cluster, cache) runs under
//! one absolute deadline. The fetch and clustering happen in a spawned task
//! holding a cancellation token; when the deadline fires the token is
//! cancelled and the task drops its result instead of writing the cache.

use common::config::{AppConfig, CacheConfig};
use common::{Cluster, Error, MagnitudeFilter, Period};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use usgs_client::EventFeed;

use crate::assembler::ClusterAssembler;
use crate::cache::ClusterCache;

/// Where a lookup is in its lifecycle. Logged as the `stage` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Fetching,
    Clustering,
    Caching,
    Done,
    TimedOut,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Idle => "idle",
            Stage::Fetching => "fetching",
            Stage::Clustering => "clustering",
            Stage::Caching => "caching",
            Stage::Done => "done",
            Stage::TimedOut => "timed_out",
            Stage::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Budget for a whole miss path, measured from the cache miss.
    pub deadline: Duration,
    /// Minimum magnitude requested from the feed.
    pub magnitude: MagnitudeFilter,
    pub ttls: CacheConfig,
    /// Serialize concurrent misses for the same period.
    pub coalesce_misses: bool,
}

impl PipelineSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            deadline: cfg.pipeline.deadline(),
            magnitude: cfg.feed.magnitude,
            ttls: cfg.cache.clone(),
            coalesce_misses: cfg.pipeline.coalesce_misses,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// One async mutex per period; holding it means "this period is being filled".
#[derive(Debug, Default)]
struct InFlight {
    locks: Mutex<HashMap<Period, Arc<Mutex<()>>>>,
}

impl InFlight {
    async fn acquire(&self, period: Period) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(period).or_default())
        };
        lock.lock_owned().await
    }
}

/// Cache-fronted, deadline-bounded cluster lookups.
///
/// Construct once at startup and share by `Arc` across request handlers.
pub struct Pipeline<F> {
    feed: Arc<F>,
    cache: ClusterCache,
    seed: u64,
    settings: PipelineSettings,
    inflight: InFlight,
}

impl<F: EventFeed> Pipeline<F> {
    pub fn new(feed: Arc<F>, cache: ClusterCache, seed: u64, settings: PipelineSettings) -> Self {
        Self {
            feed,
            cache,
            seed,
            settings,
            inflight: InFlight::default(),
        }
    }

    pub fn cache(&self) -> &ClusterCache {
        &self.cache
    }

    /// Clusters for `period`, from cache or freshly computed.
    pub async fn lookup(&self, period: Period) -> Result<Arc<Vec<Cluster>>, Error> {
        if let Some(clusters) = self.cache.get(period) {
            debug!(%period, clusters = clusters.len(), "Cache hit");
            return Ok(clusters);
        }

        let deadline = self.settings.deadline;
        let token = CancellationToken::new();
        debug!(%period, stage = %Stage::Idle, "Cache miss");

        match tokio::time::timeout(deadline, self.fill(period, token.clone(), deadline)).await {
            Ok(result) => result,
            Err(_) => {
                token.cancel();
                warn!(
                    %period,
                    stage = %Stage::TimedOut,
                    "Lookup exceeded {}ms deadline",
                    deadline.as_millis()
                );
                Err(Error::TimedOut(deadline))
            }
        }
    }

    async fn fill(
        &self,
        period: Period,
        token: CancellationToken,
        deadline: Duration,
    ) -> Result<Arc<Vec<Cluster>>, Error> {
        let _guard = if self.settings.coalesce_misses {
            Some(self.inflight.acquire(period).await)
        } else {
            None
        };

        // Another lookup may have filled the entry while we waited.
        if let Some(clusters) = self.cache.get(period) {
            debug!(%period, "Filled by a concurrent lookup");
            return Ok(clusters);
        }

        let run = MissRun {
            feed: Arc::clone(&self.feed),
            cache: self.cache.clone(),
            assembler: ClusterAssembler::new(self.seed),
            magnitude: self.settings.magnitude,
            ttl: self.settings.ttls.ttl_for(period),
            period,
            token,
            deadline,
        };

        tokio::spawn(run.execute())
            .await
            .map_err(|e| Error::Other(format!("lookup task for {} failed: {}", period, e)))?
    }
}

/// The unit of work spawned for a cache miss.
struct MissRun<F> {
    feed: Arc<F>,
    cache: ClusterCache,
    assembler: ClusterAssembler,
    magnitude: MagnitudeFilter,
    ttl: Duration,
    period: Period,
    token: CancellationToken,
    deadline: Duration,
}

impl<F: EventFeed> MissRun<F> {
    async fn execute(self) -> Result<Arc<Vec<Cluster>>, Error> {
        let period = self.period;

        debug!(%period, magnitude = %self.magnitude, stage = %Stage::Fetching, "Fetching events");
        let fetched = tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                debug!(%period, "Fetch abandoned after deadline");
                return Err(Error::TimedOut(self.deadline));
            }
            result = self.feed.fetch(period, self.magnitude) => result,
        };
        let records = fetched.inspect_err(|e| {
            warn!(%period, stage = %Stage::Failed, "Fetch failed: {}", e);
        })?;

        debug!(%period, events = records.len(), stage = %Stage::Clustering, "Clustering events");
        let clusters = self.assembler.assemble(records).inspect_err(|e| {
            warn!(%period, stage = %Stage::Failed, "Clustering failed: {}", e);
        })?;
        let clusters = Arc::new(clusters);

        // The caller is gone; a late write could clobber a fresher entry.
        if self.token.is_cancelled() {
            debug!(%period, "Deadline passed before caching; dropping result");
            return Err(Error::TimedOut(self.deadline));
        }

        debug!(%period, stage = %Stage::Caching, "Caching clusters");
        self.cache.put(period, Arc::clone(&clusters), self.ttl);
        info!(
            %period,
            clusters = clusters.len(),
            ttl_secs = self.ttl.as_secs(),
            stage = %Stage::Done,
            "Performed cache set"
        );

        Ok(clusters)
    }
}
