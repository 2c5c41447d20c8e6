//! Cache Statistics Module
//!
//! Tracks fetch activity: how many fetches ran, how many triggers were
//! absorbed by an in-flight fetch, and how they settled.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache fetch metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Fetches actually started
    pub fetches_started: u64,
    /// Triggers that found a fetch already in flight
    pub fetches_deduplicated: u64,
    /// Fetches that resolved with a value
    pub fetch_successes: u64,
    /// Fetches that resolved with an error
    pub fetch_failures: u64,
    /// Results discarded because a newer value was written meanwhile
    pub superseded_results: u64,
    /// Entries removed by grace-window sweeps or capacity pressure
    pub evictions: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Current number of live subscriptions across all keys
    pub active_subscriptions: usize,
    /// Current number of fetches in flight
    pub in_flight: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Failure Rate ==
    /// Returns failures / (successes + failures), or 0.0 if nothing settled yet.
    pub fn failure_rate(&self) -> f64 {
        let total = self.fetch_successes + self.fetch_failures;
        if total == 0 {
            0.0
        } else {
            self.fetch_failures as f64 / total as f64
        }
    }

    pub fn record_fetch_started(&mut self) {
        self.fetches_started += 1;
    }

    pub fn record_deduplicated(&mut self) {
        self.fetches_deduplicated += 1;
    }

    pub fn record_success(&mut self) {
        self.fetch_successes += 1;
    }

    pub fn record_failure(&mut self) {
        self.fetch_failures += 1;
    }

    pub fn record_superseded(&mut self) {
        self.superseded_results += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.fetches_started, 0);
        assert_eq!(stats.fetch_successes, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_failure_rate_nothing_settled() {
        let stats = CacheStats::new();
        assert_eq!(stats.failure_rate(), 0.0);
    }

    #[test]
    fn test_failure_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_success();
        stats.record_success();
        stats.record_success();
        stats.record_failure();
        assert_eq!(stats.failure_rate(), 0.25);
    }

    #[test]
    fn test_counters() {
        let mut stats = CacheStats::new();
        stats.record_fetch_started();
        stats.record_deduplicated();
        stats.record_deduplicated();
        stats.record_superseded();
        stats.record_eviction();

        assert_eq!(stats.fetches_started, 1);
        assert_eq!(stats.fetches_deduplicated, 2);
        assert_eq!(stats.superseded_results, 1);
        assert_eq!(stats.evictions, 1);
    }
}
