//! Cache Module
//!
//! Provides a keyed stale-while-revalidate cache with in-flight
//! deduplication, per-key revalidation timers and grace-period eviction.

mod entry;
mod key;
mod lru;
mod stats;
mod store;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

// Re-export public types
pub use entry::{CacheEntry, EntrySnapshot, EntryStatus, Listener, Outcome, PendingFetch};
pub use key::{CacheKey, Fetcher};
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::{FetchCache, FetchReason, ListenerId, SubscriptionHandle};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

// == Cache Options ==
/// Timing and capacity knobs for a [`FetchCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Period of background revalidation for subscribed keys; zero disables it
    pub refresh_interval: Duration,
    /// Age at which a new subscription forces a fetch
    pub max_age: Duration,
    /// How long an unsubscribed entry survives before eviction
    pub eviction_grace: Duration,
    /// Soft bound on the number of entries; zero means unbounded
    pub max_entries: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            max_age: Duration::from_secs(60),
            eviction_grace: Duration::from_secs(300),
            max_entries: 1000,
        }
    }
}
