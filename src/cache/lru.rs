//! LRU Tracker Module
//!
//! Tracks key recency so the cache can pick which idle entry to drop when the
//! table is full.

use std::collections::VecDeque;

// == LRU Tracker ==
/// Tracks access order for LRU eviction.
///
/// Keys are stored in a VecDeque where:
/// - Front = Most recently used
/// - Back = Least recently used
#[derive(Debug)]
pub struct LruTracker<K> {
    /// Order of keys by access time
    order: VecDeque<K>,
}

impl<K> Default for LruTracker<K> {
    fn default() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }
}

impl<K: PartialEq + Clone> LruTracker<K> {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as recently used (moves to front).
    pub fn touch(&mut self, key: &K) {
        self.remove(key);
        self.order.push_front(key.clone());
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &K) {
        self.order.retain(|k| k != key);
    }

    // == Oldest Matching ==
    /// Returns the least recently used key accepted by `eligible`.
    ///
    /// The key stays tracked; callers remove it once the entry is gone.
    pub fn oldest_matching<F>(&self, mut eligible: F) -> Option<K>
    where
        F: FnMut(&K) -> bool,
    {
        self.order.iter().rev().find(|k| eligible(k)).cloned()
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // == Contains ==
    /// Checks if a key is being tracked.
    pub fn contains(&self, key: &K) -> bool {
        self.order.iter().any(|k| k == key)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn test_lru_new() {
        let lru: LruTracker<String> = LruTracker::new();
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
    }

    #[test]
    fn test_lru_touch_existing_key_moves_to_front() {
        let mut lru = LruTracker::new();

        lru.touch(&key("a"));
        lru.touch(&key("b"));
        lru.touch(&key("c"));
        lru.touch(&key("a"));

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.oldest_matching(|_| true), Some(key("b")));
    }

    #[test]
    fn test_lru_oldest_matching_skips_ineligible() {
        let mut lru = LruTracker::new();

        lru.touch(&key("busy"));
        lru.touch(&key("idle1"));
        lru.touch(&key("idle2"));

        let oldest_idle = lru.oldest_matching(|k| k.starts_with("idle"));
        assert_eq!(oldest_idle, Some(key("idle1")));
        // Selection does not untrack the key
        assert!(lru.contains(&key("idle1")));
    }

    #[test]
    fn test_lru_oldest_matching_none_eligible() {
        let mut lru = LruTracker::new();
        lru.touch(&key("a"));

        assert_eq!(lru.oldest_matching(|_| false), None);
    }

    #[test]
    fn test_lru_remove() {
        let mut lru = LruTracker::new();

        lru.touch(&key("key1"));
        lru.touch(&key("key2"));
        lru.remove(&key("key1"));
        lru.remove(&key("nonexistent"));

        assert_eq!(lru.len(), 1);
        assert!(!lru.contains(&key("key1")));
        assert!(lru.contains(&key("key2")));
    }

    #[test]
    fn test_lru_touch_same_key_multiple_times() {
        let mut lru = LruTracker::new();

        lru.touch(&key("key1"));
        lru.touch(&key("key1"));
        lru.touch(&key("key1"));

        assert_eq!(lru.len(), 1);
    }
}
