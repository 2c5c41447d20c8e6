//! Cache Store Module
//!
//! Keyed stale-while-revalidate cache: one entry per key, at most one fetch in
//! flight per key, per-key revalidation timers while subscribed, and grace
//! period eviction once nobody is subscribed.
//!
//! All state transitions happen under a single `std::sync::Mutex` and never
//! await. Fetches run as detached tokio tasks and write their result back by
//! key when they finish, whether or not anyone is still subscribed.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::{
    CacheEntry, CacheKey, CacheOptions, CacheStats, EntrySnapshot, Fetcher, Listener, LruTracker,
};
use crate::error::{CacheError, FetchError, Result};

// == Fetch Reason ==
/// Why a fetch was requested. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReason {
    Subscribe,
    Interval,
    Mutate,
    Reconnect,
    Superseded,
}

/// Identifies a registered change listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// == Internal State ==
struct CacheState<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    lru: LruTracker<K>,
    stats: CacheStats,
    next_id: u64,
}

impl<K: CacheKey, V> CacheState<K, V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            next_id: 0,
        }
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Creates the entry for `key` if missing.
    ///
    /// When the table is full the least recently used idle entry makes room.
    /// Entries with subscribers or a fetch in flight are never dropped here.
    fn ensure_entry(&mut self, key: &K, now: Instant, max_entries: usize) {
        if self.entries.contains_key(key) {
            return;
        }

        if max_entries > 0 && self.entries.len() >= max_entries {
            let entries = &self.entries;
            let victim = self
                .lru
                .oldest_matching(|k| entries.get(k).is_some_and(CacheEntry::is_idle));

            match victim {
                Some(victim) => {
                    self.entries.remove(&victim);
                    self.lru.remove(&victim);
                    self.stats.record_eviction();
                    debug!(key = ?victim, "Evicted least recently used idle entry");
                }
                None => {
                    warn!(
                        capacity = max_entries,
                        "Cache full of active entries, growing past capacity"
                    );
                }
            }
        }

        self.entries.insert(key.clone(), CacheEntry::new(now));
        self.lru.touch(key);
        debug!(key = ?key, "Created cache entry");
    }
}

struct Shared<K: CacheKey, V: Send + Sync + 'static> {
    state: Mutex<CacheState<K, V>>,
    fetcher: Arc<dyn Fetcher<K, V>>,
    options: CacheOptions,
    runtime: Handle,
}

// == Fetch Cache ==
/// Process-local keyed stale-while-revalidate cache.
///
/// Cloning is cheap and yields another handle to the same cache.
pub struct FetchCache<K: CacheKey, V: Send + Sync + 'static> {
    shared: Arc<Shared<K, V>>,
}

impl<K: CacheKey, V: Send + Sync + 'static> Clone for FetchCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K: CacheKey, V: Send + Sync + 'static> fmt::Debug for FetchCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchCache")
            .field("options", &self.shared.options)
            .field("entries", &self.len())
            .finish()
    }
}

impl<K: CacheKey, V: Send + Sync + 'static> FetchCache<K, V> {
    // == Constructor ==
    /// Creates a cache driven by the current tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime; use [`FetchCache::with_runtime`]
    /// to pass a handle explicitly.
    pub fn new<F>(fetcher: F, options: CacheOptions) -> Self
    where
        F: Fetcher<K, V>,
    {
        Self::with_runtime(fetcher, options, Handle::current())
    }

    /// Creates a cache whose fetches and timers run on `runtime`.
    pub fn with_runtime<F>(fetcher: F, options: CacheOptions, runtime: Handle) -> Self
    where
        F: Fetcher<K, V>,
    {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(CacheState::new()),
                fetcher: Arc::new(fetcher),
                options,
                runtime,
            }),
        }
    }

    pub fn options(&self) -> &CacheOptions {
        &self.shared.options
    }

    /// Runtime that drives this cache's fetches and timers.
    pub fn runtime(&self) -> &Handle {
        &self.shared.runtime
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<K, V>> {
        // Listeners run under the lock; a panicking one must not wedge the cache.
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // == Subscribe ==
    /// Registers interest in `key`.
    ///
    /// Creates the entry on first use, starts the key's revalidation timer on
    /// the first subscriber, and starts a fetch when the entry has no value,
    /// was invalidated, or is older than `max_age`. Fetch failures never
    /// surface here; they land in the entry.
    pub fn subscribe(&self, key: K) -> Result<SubscriptionHandle<K, V>> {
        self.subscribe_inner(key, None)
    }

    /// Like [`FetchCache::subscribe`], registering `listener` atomically with
    /// the subscription so it observes the transition this call may cause.
    pub fn subscribe_with_listener<L>(&self, key: K, listener: L) -> Result<SubscriptionHandle<K, V>>
    where
        L: Fn(&EntrySnapshot<V>) + Send + Sync + 'static,
    {
        self.subscribe_inner(key, Some(Arc::new(listener)))
    }

    fn subscribe_inner(
        &self,
        key: K,
        listener: Option<Listener<V>>,
    ) -> Result<SubscriptionHandle<K, V>> {
        key.validate().map_err(CacheError::InvalidKey)?;

        let now = Instant::now();
        let mut guard = self.lock();
        let state = &mut *guard;

        let handle_id = state.allocate_id();
        let listener_id = listener.as_ref().map(|_| state.allocate_id());
        state.ensure_entry(&key, now, self.shared.options.max_entries);
        state.lru.touch(&key);

        let entry = state
            .entries
            .get_mut(&key)
            .ok_or_else(|| CacheError::Internal("entry missing after insert".to_string()))?;

        if let (Some(id), Some(listener)) = (listener_id, listener) {
            entry.add_listener(id, listener);
        }

        let subscribers = entry.add_subscriber();
        if subscribers == 1 {
            entry.set_revalidator(self.spawn_revalidator(key.clone()));
        }
        let should_fetch = entry.needs_fetch(now, self.shared.options.max_age);

        debug!(key = ?key, subscribers, should_fetch, "Subscribed");

        if should_fetch {
            self.trigger_fetch(state, &key, FetchReason::Subscribe);
        }

        Ok(SubscriptionHandle {
            key,
            listener: listener_id.map(ListenerId),
            cache: Arc::downgrade(&self.shared),
            released: false,
        })
    }

    // == Unsubscribe ==
    /// Ends a subscription. Equivalent to dropping the handle.
    ///
    /// The entry stays cached; the revalidation timer stops when the last
    /// subscriber leaves.
    pub fn unsubscribe(&self, mut handle: SubscriptionHandle<K, V>) {
        handle.release();
    }

    fn release(&self, key: &K, listener: Option<ListenerId>) {
        let mut guard = self.lock();
        let Some(entry) = guard.entries.get_mut(key) else {
            return;
        };

        let now = Instant::now();
        if let Some(ListenerId(id)) = listener {
            entry.remove_listener(id, now);
        }

        let remaining = entry.remove_subscriber(now);
        if remaining == 0 {
            if let Some(timer) = entry.take_revalidator() {
                timer.abort();
            }
        }
        debug!(key = ?key, remaining, "Unsubscribed");
    }

    // == Get Snapshot ==
    /// Returns the current state of `key` without triggering any fetch.
    ///
    /// Unknown keys yield an empty snapshot.
    pub fn get_snapshot(&self, key: &K) -> EntrySnapshot<V> {
        let guard = self.lock();
        guard
            .entries
            .get(key)
            .map(CacheEntry::snapshot)
            .unwrap_or_default()
    }

    // == Mutate ==
    /// Manual invalidation or update.
    ///
    /// - `None`: marks the entry stale and revalidates now if subscribed.
    /// - `Some(value)`: replaces the cached value, then revalidates in the
    ///   background if subscribed. An older fetch still in flight is
    ///   superseded and its result discarded.
    ///
    /// Returns `true` when this call started a fetch.
    pub fn mutate(&self, key: &K, value: Option<V>) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;

        match value {
            Some(value) => self.replace_locked(state, key, value),
            None => {
                let Some(entry) = state.entries.get_mut(key) else {
                    return false;
                };
                entry.mark_stale();
                if entry.subscriber_count() == 0 {
                    debug!(key = ?key, "Marked unsubscribed entry stale");
                    return false;
                }
                self.trigger_fetch(state, key, FetchReason::Mutate)
            }
        }
    }

    /// Replaces the cached value with `update(current)`.
    ///
    /// `update` runs while the cache is locked and must not call back into it.
    pub fn mutate_with<F>(&self, key: &K, update: F) -> bool
    where
        F: FnOnce(Option<&V>) -> V,
    {
        let mut guard = self.lock();
        let state = &mut *guard;
        let current = state.entries.get(key).and_then(CacheEntry::value);
        let next = update(current.as_deref());
        self.replace_locked(state, key, next)
    }

    fn replace_locked(&self, state: &mut CacheState<K, V>, key: &K, value: V) -> bool {
        if let Err(reason) = key.validate() {
            warn!(key = ?key, %reason, "Ignoring mutation of malformed key");
            return false;
        }

        state.ensure_entry(key, Instant::now(), self.shared.options.max_entries);
        state.lru.touch(key);
        let Some(entry) = state.entries.get_mut(key) else {
            return false;
        };

        entry.replace_value(value);
        entry.notify();

        if entry.subscriber_count() == 0 {
            return false;
        }
        self.trigger_fetch(state, key, FetchReason::Mutate)
    }

    // == Listeners ==
    /// Registers a listener fired on every status, value or error transition
    /// of `key`, in transition order.
    ///
    /// Listeners run synchronously while the cache is locked: they must not
    /// call back into the cache. An entry with listeners is never evicted.
    pub fn on_change<L>(&self, key: &K, listener: L) -> Result<ListenerId>
    where
        L: Fn(&EntrySnapshot<V>) + Send + Sync + 'static,
    {
        key.validate().map_err(CacheError::InvalidKey)?;

        let mut guard = self.lock();
        let state = &mut *guard;
        let id = state.allocate_id();
        state.ensure_entry(key, Instant::now(), self.shared.options.max_entries);

        let entry = state
            .entries
            .get_mut(key)
            .ok_or_else(|| CacheError::Internal("entry missing after insert".to_string()))?;
        entry.add_listener(id, Arc::new(listener));
        Ok(ListenerId(id))
    }

    pub fn remove_listener(&self, key: &K, id: ListenerId) -> bool {
        let mut guard = self.lock();
        guard
            .entries
            .get_mut(key)
            .is_some_and(|entry| entry.remove_listener(id.0, Instant::now()))
    }

    // == Revalidation ==
    /// Revalidates every subscribed key, e.g. after a network reconnect.
    ///
    /// Returns the number of fetches started.
    pub fn revalidate_active(&self) -> usize {
        let mut guard = self.lock();
        let state = &mut *guard;

        let keys: Vec<K> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.subscriber_count() > 0)
            .map(|(key, _)| key.clone())
            .collect();

        let mut started = 0;
        for key in &keys {
            if self.trigger_fetch(state, key, FetchReason::Reconnect) {
                started += 1;
            }
        }
        started
    }

    /// Timer entry point: step 1 of the fetch algorithm, only while subscribed.
    fn revalidate(&self, key: &K, reason: FetchReason) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        match state.entries.get(key) {
            Some(entry) if entry.subscriber_count() > 0 => self.trigger_fetch(state, key, reason),
            _ => false,
        }
    }

    fn spawn_revalidator(&self, key: K) -> Option<JoinHandle<()>> {
        let interval = self.shared.options.refresh_interval;
        if interval.is_zero() {
            return None;
        }

        let cache = Arc::downgrade(&self.shared);
        Some(self.shared.runtime.spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let Some(shared) = cache.upgrade() else {
                    break;
                };
                FetchCache { shared }.revalidate(&key, FetchReason::Interval);
            }
        }))
    }

    // == Fetch Lifecycle ==
    /// Starts a fetch for `key` unless one is already in flight.
    fn trigger_fetch(&self, state: &mut CacheState<K, V>, key: &K, reason: FetchReason) -> bool {
        let fetch_id = state.allocate_id();
        let Some(entry) = state.entries.get_mut(key) else {
            return false;
        };

        if entry.is_fetching() {
            state.stats.record_deduplicated();
            debug!(key = ?key, ?reason, "Fetch already in flight, joining it");
            return false;
        }

        entry.begin_fetch(fetch_id, Instant::now());
        entry.notify();
        state.stats.record_fetch_started();
        debug!(key = ?key, ?reason, fetch_id, "Starting fetch");

        self.spawn_fetch(key.clone(), fetch_id);
        true
    }

    fn spawn_fetch(&self, key: K, fetch_id: u64) {
        let cache = self.clone();
        let fetcher = Arc::clone(&self.shared.fetcher);
        let runtime = self.shared.runtime.clone();

        self.shared.runtime.spawn(async move {
            let task_key = key.clone();
            // A nested task turns a panicking fetcher into a JoinError instead of
            // leaving the entry stuck in Fetching.
            let result = runtime
                .spawn(async move { fetcher.fetch(&task_key).await })
                .await
                .unwrap_or_else(|err| Err(FetchError::Aborted(err.to_string())));

            cache.complete_fetch(&key, fetch_id, result);
        });
    }

    fn complete_fetch(&self, key: &K, fetch_id: u64, result: std::result::Result<V, FetchError>) {
        let now = Instant::now();
        let mut guard = self.lock();
        let state = &mut *guard;

        let Some(entry) = state.entries.get_mut(key) else {
            debug!(key = ?key, fetch_id, "Entry gone before fetch completed");
            return;
        };

        let pending = match entry.in_flight() {
            Some(pending) if pending.id == fetch_id => pending,
            _ => {
                debug!(key = ?key, fetch_id, "Ignoring result of a fetch that is no longer current");
                return;
            }
        };

        if pending.superseded {
            entry.discard_in_flight();
            state.stats.record_superseded();
            debug!(key = ?key, fetch_id, "Discarded result superseded by a newer value");

            if entry.subscriber_count() > 0 {
                self.trigger_fetch(state, key, FetchReason::Superseded);
            } else {
                entry.notify();
            }
            return;
        }

        let elapsed_ms = now.saturating_duration_since(pending.started_at).as_millis() as u64;
        match result {
            Ok(value) => {
                entry.settle_ok(value, now, Utc::now());
                state.stats.record_success();
                debug!(key = ?key, fetch_id, elapsed_ms, "Fetch succeeded");
            }
            Err(error) => {
                warn!(key = ?key, fetch_id, elapsed_ms, %error, "Fetch failed");
                entry.settle_err(error);
                state.stats.record_failure();
            }
        }
        entry.notify();
    }

    // == Eviction ==
    /// Removes entries nobody subscribed to for at least the grace window.
    ///
    /// Returns the number of entries removed.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let grace = self.shared.options.eviction_grace;
        let mut guard = self.lock();
        let state = &mut *guard;

        let expired: Vec<K> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_evictable(now, grace))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.entries.remove(key);
            state.lru.remove(key);
            state.stats.record_eviction();
        }
        expired.len()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let guard = self.lock();
        let mut stats = guard.stats.clone();
        stats.total_entries = guard.entries.len();
        stats.active_subscriptions = guard
            .entries
            .values()
            .map(CacheEntry::subscriber_count)
            .sum();
        stats.in_flight = guard
            .entries
            .values()
            .filter(|entry| entry.is_fetching())
            .count();
        stats
    }

    pub fn subscriber_count(&self, key: &K) -> usize {
        self.lock()
            .entries
            .get(key)
            .map_or(0, CacheEntry::subscriber_count)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().entries.contains_key(key)
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

// == Subscription Handle ==
/// A live subscription to one key.
///
/// Dropping the handle unsubscribes (and removes the listener registered with
/// it, if any).
#[must_use = "dropping the handle ends the subscription immediately"]
pub struct SubscriptionHandle<K: CacheKey, V: Send + Sync + 'static> {
    key: K,
    listener: Option<ListenerId>,
    cache: Weak<Shared<K, V>>,
    released: bool,
}

impl<K: CacheKey, V: Send + Sync + 'static> SubscriptionHandle<K, V> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn listener(&self) -> Option<ListenerId> {
        self.listener
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some(shared) = self.cache.upgrade() {
            FetchCache { shared }.release(&self.key, self.listener);
        }
    }
}

impl<K: CacheKey, V: Send + Sync + 'static> Drop for SubscriptionHandle<K, V> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<K: CacheKey, V: Send + Sync + 'static> fmt::Debug for SubscriptionHandle<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("key", &self.key)
            .field("listener", &self.listener)
            .field("released", &self.released)
            .finish()
    }
}
