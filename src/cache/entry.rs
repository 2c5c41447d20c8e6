//! Cache Entry Module
//!
//! Per-key record of value, error, fetch status and subscribers.
//!
//! Every transition bumps `version` and keeps `status == Fetching` in lockstep
//! with `in_flight` being present.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::FetchError;

/// Callback invoked on every state transition of an entry.
pub type Listener<V> = Arc<dyn Fn(&EntrySnapshot<V>) + Send + Sync>;

// == Status ==
/// Result of the most recent completed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Err,
}

/// Lifecycle state of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// No fetch has completed yet
    Idle,
    /// A fetch is in flight
    Fetching,
    /// The last fetch completed
    Settled(Outcome),
}

// == Pending Fetch ==
/// The single outstanding fetch for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingFetch {
    /// Unique fetch identifier within the owning cache
    pub id: u64,
    /// When the fetch was started
    pub started_at: Instant,
    /// Set when a newer value was written while this fetch was running
    pub superseded: bool,
}

// == Snapshot ==
/// Point-in-time view of an entry handed to readers and listeners.
#[derive(Debug)]
pub struct EntrySnapshot<V> {
    /// Last successfully fetched (or optimistically written) value
    pub value: Option<Arc<V>>,
    /// Last fetch failure, cleared by the next success
    pub error: Option<FetchError>,
    /// Fetch in flight and nothing cached yet
    pub is_loading: bool,
    /// Any fetch in flight
    pub is_validating: bool,
    pub status: EntryStatus,
    /// Wall-clock time of the last successful fetch
    pub fetched_at: Option<DateTime<Utc>>,
    /// Monotonic per-entry transition counter
    pub version: u64,
}

impl<V> Clone for EntrySnapshot<V> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
            is_validating: self.is_validating,
            status: self.status,
            fetched_at: self.fetched_at,
            version: self.version,
        }
    }
}

impl<V> Default for EntrySnapshot<V> {
    fn default() -> Self {
        Self {
            value: None,
            error: None,
            is_loading: false,
            is_validating: false,
            status: EntryStatus::Idle,
            fetched_at: None,
            version: 0,
        }
    }
}

// == Cache Entry ==
/// Represents a single cache entry. Owned exclusively by the cache.
pub struct CacheEntry<V> {
    value: Option<Arc<V>>,
    error: Option<FetchError>,
    status: EntryStatus,
    last_outcome: Option<Outcome>,
    /// Monotonic reading at the last successful completion
    last_fetched_at: Option<Instant>,
    fetched_at: Option<DateTime<Utc>>,
    in_flight: Option<PendingFetch>,
    /// Forces the next read-time check to fetch
    stale: bool,
    subscriber_count: usize,
    /// Set while `subscriber_count == 0`
    idle_since: Option<Instant>,
    version: u64,
    listeners: BTreeMap<u64, Listener<V>>,
    revalidator: Option<JoinHandle<()>>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an empty, unsubscribed entry.
    pub fn new(now: Instant) -> Self {
        Self {
            value: None,
            error: None,
            status: EntryStatus::Idle,
            last_outcome: None,
            last_fetched_at: None,
            fetched_at: None,
            in_flight: None,
            stale: false,
            subscriber_count: 0,
            idle_since: Some(now),
            version: 0,
            listeners: BTreeMap::new(),
            revalidator: None,
        }
    }

    pub fn value(&self) -> Option<Arc<V>> {
        self.value.clone()
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn in_flight(&self) -> Option<PendingFetch> {
        self.in_flight
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count
    }

    pub fn last_fetched_at(&self) -> Option<Instant> {
        self.last_fetched_at
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    // == Staleness ==
    /// Checks whether a read at `now` must trigger a fetch.
    ///
    /// True when nothing is cached, the entry was invalidated, or the last
    /// success is at least `max_age` old.
    pub fn needs_fetch(&self, now: Instant, max_age: Duration) -> bool {
        if self.value.is_none() || self.stale {
            return true;
        }
        match self.last_fetched_at {
            Some(at) => now.saturating_duration_since(at) >= max_age,
            None => true,
        }
    }

    /// Checks whether the entry may be dropped by an eviction sweep.
    pub fn is_evictable(&self, now: Instant, grace: Duration) -> bool {
        self.is_idle()
            && self
                .idle_since
                .is_some_and(|since| now.saturating_duration_since(since) >= grace)
    }

    /// No subscribers, no listeners and nothing in flight.
    pub fn is_idle(&self) -> bool {
        self.subscriber_count == 0 && self.listeners.is_empty() && self.in_flight.is_none()
    }

    // == Subscribers ==
    /// Adds a subscriber and returns the new count.
    pub fn add_subscriber(&mut self) -> usize {
        self.subscriber_count += 1;
        self.idle_since = None;
        self.subscriber_count
    }

    /// Removes a subscriber and returns the remaining count.
    pub fn remove_subscriber(&mut self, now: Instant) -> usize {
        self.subscriber_count = self.subscriber_count.saturating_sub(1);
        if self.subscriber_count == 0 {
            self.idle_since = Some(now);
        }
        self.subscriber_count
    }

    // == Revalidation Timer ==
    pub fn set_revalidator(&mut self, timer: Option<JoinHandle<()>>) {
        if let Some(previous) = std::mem::replace(&mut self.revalidator, timer) {
            previous.abort();
        }
    }

    pub fn take_revalidator(&mut self) -> Option<JoinHandle<()>> {
        self.revalidator.take()
    }

    // == Listeners ==
    pub fn add_listener(&mut self, id: u64, listener: Listener<V>) {
        self.listeners.insert(id, listener);
    }

    /// Removes a listener. The grace window restarts when the last one leaves
    /// an unsubscribed entry.
    pub fn remove_listener(&mut self, id: u64, now: Instant) -> bool {
        let removed = self.listeners.remove(&id).is_some();
        if removed && self.listeners.is_empty() && self.subscriber_count == 0 {
            self.idle_since = Some(now);
        }
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Delivers the current snapshot to every listener in registration order.
    pub fn notify(&self) {
        if self.listeners.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for listener in self.listeners.values() {
            listener(&snapshot);
        }
    }

    // == Transitions ==
    /// Idle/Settled -> Fetching.
    pub fn begin_fetch(&mut self, id: u64, now: Instant) {
        self.in_flight = Some(PendingFetch {
            id,
            started_at: now,
            superseded: false,
        });
        self.status = EntryStatus::Fetching;
        self.version += 1;
    }

    /// Fetching -> Settled(Ok). Clears any previous error.
    pub fn settle_ok(&mut self, value: V, now: Instant, wall: DateTime<Utc>) {
        self.in_flight = None;
        self.value = Some(Arc::new(value));
        self.error = None;
        self.stale = false;
        self.last_fetched_at = Some(now);
        self.fetched_at = Some(wall);
        self.finish(Outcome::Ok);
    }

    /// Fetching -> Settled(Err). The cached value is kept.
    pub fn settle_err(&mut self, error: FetchError) {
        self.in_flight = None;
        self.error = Some(error);
        self.finish(Outcome::Err);
    }

    /// Drops a superseded fetch without touching value or error.
    pub fn discard_in_flight(&mut self) {
        self.in_flight = None;
        self.status = self
            .last_outcome
            .map_or(EntryStatus::Idle, EntryStatus::Settled);
        self.version += 1;
    }

    /// Writes a value directly and invalidates it for reconciliation.
    ///
    /// A fetch already in flight is marked superseded so its older result
    /// cannot overwrite this value.
    pub fn replace_value(&mut self, value: V) {
        self.value = Some(Arc::new(value));
        self.stale = true;
        if let Some(pending) = self.in_flight.as_mut() {
            pending.superseded = true;
        }
        self.version += 1;
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    fn finish(&mut self, outcome: Outcome) {
        self.last_outcome = Some(outcome);
        self.status = EntryStatus::Settled(outcome);
        self.version += 1;
    }

    // == Snapshot ==
    pub fn snapshot(&self) -> EntrySnapshot<V> {
        EntrySnapshot {
            value: self.value.clone(),
            error: self.error.clone(),
            is_loading: self.in_flight.is_some() && self.value.is_none(),
            is_validating: self.in_flight.is_some(),
            status: self.status,
            fetched_at: self.fetched_at,
            version: self.version,
        }
    }
}

impl<V> Drop for CacheEntry<V> {
    fn drop(&mut self) {
        if let Some(timer) = self.revalidator.take() {
            timer.abort();
        }
    }
}

impl<V> fmt::Debug for CacheEntry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("has_value", &self.value.is_some())
            .field("error", &self.error)
            .field("status", &self.status)
            .field("in_flight", &self.in_flight)
            .field("stale", &self.stale)
            .field("subscriber_count", &self.subscriber_count)
            .field("listeners", &self.listeners.len())
            .field("version", &self.version)
            .finish()
    }
}
