//! Portfolio Feed
//!
//! Binds a credential token to the portfolio cache and exposes
//! `{portfolio, is_loading, error, refresh}`. An empty token yields an inactive
//! feed: no fetch, no data.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::binding::{BindingView, SubscriptionBinding};
use crate::error::{FetchError, Result};
use crate::portfolio::{PortfolioCache, PortfolioKey, PortfolioSnapshot};

// == Portfolio View ==
#[derive(Debug, Clone, Default)]
pub struct PortfolioView {
    pub portfolio: Option<Arc<PortfolioSnapshot>>,
    pub is_loading: bool,
    pub is_validating: bool,
    pub error: Option<FetchError>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl From<BindingView<PortfolioSnapshot>> for PortfolioView {
    fn from(view: BindingView<PortfolioSnapshot>) -> Self {
        Self {
            portfolio: view.data,
            is_loading: view.is_loading,
            is_validating: view.is_validating,
            error: view.error,
            fetched_at: view.fetched_at,
        }
    }
}

// == Portfolio Feed ==
#[derive(Debug)]
pub struct PortfolioFeed {
    binding: SubscriptionBinding<str, PortfolioKey, PortfolioSnapshot>,
}

impl PortfolioFeed {
    /// Binds `token`, starting a fetch if nothing fresh is cached for it.
    pub fn new(cache: PortfolioCache, token: &str) -> Result<Self> {
        let binding = SubscriptionBinding::bind(cache, PortfolioKey::for_token, token)?;
        Ok(Self { binding })
    }

    /// Switches to another token (or to none).
    pub fn set_token(&mut self, token: &str) -> Result<()> {
        self.binding.update(token)
    }

    pub fn is_active(&self) -> bool {
        self.binding.is_active()
    }

    pub fn view(&self) -> PortfolioView {
        self.binding.view().into()
    }

    pub fn watch(&self) -> watch::Receiver<BindingView<PortfolioSnapshot>> {
        self.binding.watch()
    }

    /// Waits for any in-flight fetch of the current token to finish.
    pub async fn settled(&self) -> PortfolioView {
        self.binding.settled().await.into()
    }

    /// Forces a revalidation. Returns `true` if a fetch started.
    pub fn refresh(&self) -> bool {
        self.binding.refresh()
    }
}
