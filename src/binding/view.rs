//! Binding View Module
//!
//! The reactive `{data, is_loading, error}` view a binding publishes.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::cache::EntrySnapshot;
use crate::error::FetchError;

// == Binding View ==
/// Consumer-facing state of a binding.
#[derive(Debug)]
pub struct BindingView<V> {
    /// Cached value, possibly stale while revalidating
    pub data: Option<Arc<V>>,
    /// Last fetch failure; may coexist with `data`
    pub error: Option<FetchError>,
    /// First fetch in flight, nothing to show yet
    pub is_loading: bool,
    /// Any fetch in flight
    pub is_validating: bool,
    /// A key is bound
    pub active: bool,
    /// Wall-clock time of the last successful fetch
    pub fetched_at: Option<DateTime<Utc>>,
    version: u64,
}

impl<V> BindingView<V> {
    /// View of a binding with no key.
    pub fn inactive() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
            is_validating: false,
            active: false,
            fetched_at: None,
            version: 0,
        }
    }

    pub(crate) fn pending() -> Self {
        Self {
            active: true,
            ..Self::inactive()
        }
    }

    pub(crate) fn from_snapshot(snapshot: &EntrySnapshot<V>) -> Self {
        Self {
            data: snapshot.value.clone(),
            error: snapshot.error.clone(),
            is_loading: snapshot.is_loading,
            is_validating: snapshot.is_validating,
            active: true,
            fetched_at: snapshot.fetched_at,
            version: snapshot.version,
        }
    }

    pub(crate) fn version(&self) -> u64 {
        self.version
    }
}

impl<V> Clone for BindingView<V> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
            is_validating: self.is_validating,
            active: self.active,
            fetched_at: self.fetched_at,
            version: self.version,
        }
    }
}

impl<V> Default for BindingView<V> {
    fn default() -> Self {
        Self::inactive()
    }
}
