//! Test fixtures shared by the cache and binding unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{CacheOptions, Fetcher};
use crate::error::FetchError;

pub(crate) const FETCH_DELAY: Duration = Duration::from_millis(100);

/// Options used by most tests: one-minute refresh, five-minute grace.
pub(crate) fn test_options() -> CacheOptions {
    CacheOptions {
        refresh_interval: Duration::from_secs(60),
        max_age: Duration::from_secs(60),
        eviction_grace: Duration::from_secs(300),
        max_entries: 100,
    }
}

/// Lets every fetch started so far (with the default delay) complete.
///
/// Relies on a paused clock so the sleep is deterministic.
pub(crate) async fn settle() {
    tokio::time::sleep(FETCH_DELAY + Duration::from_millis(50)).await;
}

/// Fetcher that answers `"<key>#<n>"` after a fixed delay, where `n` counts
/// calls for that key. Tracks per-key concurrency.
#[derive(Debug)]
pub(crate) struct ScriptedFetcher {
    delay: Duration,
    calls: AtomicUsize,
    per_key: Mutex<HashMap<String, usize>>,
    active: Mutex<HashMap<String, usize>>,
    max_concurrent: AtomicUsize,
    failing: Mutex<HashSet<String>>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Arc<Self> {
        Self::with_delay(FETCH_DELAY)
    }

    pub(crate) fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            calls: AtomicUsize::new(0),
            per_key: Mutex::new(HashMap::new()),
            active: Mutex::new(HashMap::new()),
            max_concurrent: AtomicUsize::new(0),
            failing: Mutex::new(HashSet::new()),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn calls_for(&self, key: &str) -> usize {
        self.per_key.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    /// Highest number of simultaneous fetches observed for any single key.
    pub(crate) fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }

    pub(crate) fn fail(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub(crate) fn recover(&self, key: &str) {
        self.failing.lock().unwrap().remove(key);
    }
}

#[async_trait]
impl Fetcher<String, String> for Arc<ScriptedFetcher> {
    async fn fetch(&self, key: &String) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let n = {
            let mut per_key = self.per_key.lock().unwrap();
            let count = per_key.entry(key.clone()).or_default();
            *count += 1;
            *count
        };
        {
            let mut active = self.active.lock().unwrap();
            let running = active.entry(key.clone()).or_default();
            *running += 1;
            self.max_concurrent.fetch_max(*running, Ordering::SeqCst);
        }

        tokio::time::sleep(self.delay).await;

        if let Some(running) = self.active.lock().unwrap().get_mut(key) {
            *running -= 1;
        }

        if self.failing.lock().unwrap().contains(key) {
            return Err(FetchError::Network(format!("{key} unreachable")));
        }
        Ok(format!("{key}#{n}"))
    }
}
