//! Background sweep that evicts expired cache entries nobody reads.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::OrderCache;
use common::metrics;

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Periodic cleanup task for an [`OrderCache`].
pub struct CacheJanitor {
    cache: Arc<OrderCache>,
    interval: Duration,
    cancel: CancellationToken,
}

impl CacheJanitor {
    /// Sweep interval for a TTL: half the TTL, at most one minute.
    /// `None` when the TTL is zero and nothing can expire.
    pub fn interval_for(ttl: Duration) -> Option<Duration> {
        if ttl.is_zero() {
            return None;
        }
        Some((ttl / 2).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL))
    }

    /// Start the janitor on the current runtime.
    ///
    /// Returns `None` without spawning anything when the cache has no TTL.
    pub fn spawn(cache: Arc<OrderCache>, cancel: CancellationToken) -> Option<JanitorHandle> {
        let interval = Self::interval_for(cache.ttl())?;
        let janitor = Self {
            cache,
            interval,
            cancel: cancel.clone(),
        };

        info!(interval_ms = interval.as_millis() as u64, "Starting cache janitor");
        let task = tokio::spawn(janitor.run());
        Some(JanitorHandle { cancel, task })
    }

    async fn run(self) {
        // First tick fires one full interval after start.
        let start = tokio::time::Instant::now() + self.interval;
        let mut interval = tokio::time::interval_at(start, self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!("Cache janitor cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let removed = self.cache.purge_expired();
                    if removed > 0 {
                        metrics::record_cache_evictions(removed);
                    }
                    debug!(removed, remaining = self.cache.len(), "Cache janitor sweep finished");
                }
            }
        }
    }
}

/// Owner handle for a running janitor
pub struct JanitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl JanitorHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the sweep loop and wait for the task to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Cache janitor task ended abnormally");
        }
    }
}
