//! The portfolio collaborator and its adapter into the cache.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::{CacheOptions, FetchCache, Fetcher};
use crate::error::FetchError;
use crate::portfolio::{PortfolioKey, PortfolioSnapshot};

/// Cache of portfolio snapshots keyed by token.
pub type PortfolioCache = FetchCache<PortfolioKey, PortfolioSnapshot>;

// == Portfolio Source ==
/// Fetches a portfolio snapshot for a credential token.
#[async_trait]
pub trait PortfolioSource: Send + Sync + 'static {
    async fn fetch(&self, token: &str) -> Result<PortfolioSnapshot, FetchError>;
}

#[async_trait]
impl<S: PortfolioSource + ?Sized> PortfolioSource for Arc<S> {
    async fn fetch(&self, token: &str) -> Result<PortfolioSnapshot, FetchError> {
        (**self).fetch(token).await
    }
}

// == Source Fetcher ==
/// Adapts a [`PortfolioSource`] into the cache's [`Fetcher`].
#[derive(Debug)]
pub struct SourceFetcher<S> {
    source: S,
}

impl<S: PortfolioSource> SourceFetcher<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

#[async_trait]
impl<S: PortfolioSource> Fetcher<PortfolioKey, PortfolioSnapshot> for SourceFetcher<S> {
    async fn fetch(&self, key: &PortfolioKey) -> Result<PortfolioSnapshot, FetchError> {
        self.source.fetch(key.token()).await
    }
}

/// Builds a portfolio cache on the current tokio runtime.
pub fn portfolio_cache<S: PortfolioSource>(source: S, options: CacheOptions) -> PortfolioCache {
    FetchCache::new(SourceFetcher::new(source), options)
}
