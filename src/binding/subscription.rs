//! Subscription Binding Module
//!
//! Adapts the cache's push notifications into a pull/reactive view for one
//! consumer, following the consumer's input as it changes.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::binding::BindingView;
use crate::cache::{CacheKey, EntrySnapshot, FetchCache, SubscriptionHandle};
use crate::error::Result;

type DeriveKey<I, K> = Box<dyn Fn(&I) -> Option<K> + Send + Sync>;

// == Subscription Binding ==
/// A consumer's live binding to at most one cache key.
///
/// The key is derived from caller input; `None` means inactive (no fetch, no
/// data). Dropping the binding always unsubscribes.
pub struct SubscriptionBinding<I: ?Sized, K: CacheKey, V: Send + Sync + 'static> {
    cache: FetchCache<K, V>,
    derive_key: DeriveKey<I, K>,
    handle: Option<SubscriptionHandle<K, V>>,
    view: Arc<watch::Sender<BindingView<V>>>,
}

impl<I: ?Sized, K: CacheKey, V: Send + Sync + 'static> SubscriptionBinding<I, K, V> {
    // == Constructor ==
    /// Creates an inactive binding.
    pub fn new<F>(cache: FetchCache<K, V>, derive_key: F) -> Self
    where
        F: Fn(&I) -> Option<K> + Send + Sync + 'static,
    {
        let (view, _) = watch::channel(BindingView::inactive());
        Self {
            cache,
            derive_key: Box::new(derive_key),
            handle: None,
            view: Arc::new(view),
        }
    }

    /// Creates a binding and applies `input` right away.
    pub fn bind<F>(cache: FetchCache<K, V>, derive_key: F, input: &I) -> Result<Self>
    where
        F: Fn(&I) -> Option<K> + Send + Sync + 'static,
    {
        let mut binding = Self::new(cache, derive_key);
        binding.update(input)?;
        Ok(binding)
    }

    // == Update ==
    /// Re-derives the key from `input` and moves the subscription if it changed.
    ///
    /// The old key is released before the new one is subscribed, and the view
    /// is reset in between, so nothing from the old key leaks into the new
    /// view. On an invalid key the binding ends up inactive.
    pub fn update(&mut self, input: &I) -> Result<()> {
        let next = (self.derive_key)(input);
        if next.as_ref() == self.key() {
            return Ok(());
        }

        if let Some(previous) = self.handle.take() {
            debug!(key = ?previous.key(), "Binding released key");
            self.cache.unsubscribe(previous);
        }

        let Some(key) = next else {
            self.view.send_replace(BindingView::inactive());
            return Ok(());
        };

        self.view.send_replace(BindingView::pending());
        let sender = Arc::clone(&self.view);
        let subscribed = self
            .cache
            .subscribe_with_listener(key, move |snapshot: &EntrySnapshot<V>| {
                publish(&sender, snapshot);
            });

        match subscribed {
            Ok(handle) => {
                // Listener covers everything from here on; the read covers what
                // happened before it was registered.
                publish(&self.view, &self.cache.get_snapshot(handle.key()));
                debug!(key = ?handle.key(), "Binding subscribed");
                self.handle = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.view.send_replace(BindingView::inactive());
                Err(err)
            }
        }
    }

    // == Accessors ==
    pub fn key(&self) -> Option<&K> {
        self.handle.as_ref().map(SubscriptionHandle::key)
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Latest view.
    pub fn view(&self) -> BindingView<V> {
        self.view.borrow().clone()
    }

    /// A receiver notified on every view change.
    pub fn watch(&self) -> watch::Receiver<BindingView<V>> {
        self.view.subscribe()
    }

    /// Waits until no fetch is in flight for the bound key and returns the view.
    ///
    /// Returns immediately for an inactive binding.
    pub async fn settled(&self) -> BindingView<V> {
        let mut rx = self.view.subscribe();
        let settled = rx
            .wait_for(|view| !view.is_validating)
            .await
            .map(|view| view.clone());
        settled.unwrap_or_else(|_| self.view())
    }

    // == Refresh ==
    /// Forces a revalidation of the bound key. Returns `true` if a fetch started.
    pub fn refresh(&self) -> bool {
        match self.key() {
            Some(key) => self.cache.mutate(key, None),
            None => false,
        }
    }

    /// Optimistically replaces the bound key's value, then revalidates.
    pub fn mutate(&self, value: V) -> bool {
        match self.key() {
            Some(key) => self.cache.mutate(key, Some(value)),
            None => false,
        }
    }
}

impl<I: ?Sized, K: CacheKey, V: Send + Sync + 'static> fmt::Debug for SubscriptionBinding<I, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionBinding")
            .field("key", &self.key())
            .finish()
    }
}

/// Applies `snapshot` unless the view already reflects a later transition.
fn publish<V>(view: &watch::Sender<BindingView<V>>, snapshot: &EntrySnapshot<V>) {
    view.send_if_modified(|current| {
        if current.active && current.version() > snapshot.version {
            return false;
        }
        *current = BindingView::from_snapshot(snapshot);
        true
    });
}
