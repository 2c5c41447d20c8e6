//! Eviction Task
//!
//! Background task that periodically removes idle cache entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheKey, FetchCache};

/// Spawns a background task that periodically evicts idle cache entries.
///
/// The task runs in an infinite loop on the cache's own runtime, sleeping for
/// the specified interval between sweeps. Only idle entries whose grace window
/// has expired are removed.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = portfolio_cache(source, config.cache_options());
/// let eviction_handle = spawn_eviction_task(cache.clone(), 30);
/// // Later, during shutdown:
/// eviction_handle.abort();
/// ```
pub fn spawn_eviction_task<K, V>(cache: FetchCache<K, V>, sweep_interval_secs: u64) -> JoinHandle<()>
where
    K: CacheKey,
    V: Send + Sync + 'static,
{
    // A zero interval would spin
    let interval = Duration::from_secs(sweep_interval_secs.max(1));
    let runtime = cache.runtime().clone();

    runtime.spawn(async move {
        info!(
            "Starting eviction task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.evict_idle();

            if removed > 0 {
                info!("Eviction sweep: removed {} idle entries", removed);
            } else {
                debug!("Eviction sweep: no idle entries past grace");
            }
        }
    })
}
