//! API Handlers
//!
//! HTTP request handlers for each portfolio server endpoint.

use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{HealthResponse, PortfolioQuery, PortfolioResponse, StatsResponse};
use crate::portfolio::{
    portfolio_cache, HttpPortfolioSource, PortfolioCache, PortfolioFeed, PortfolioView,
};

/// Application state shared across all handlers.
///
/// The cache handle is cheap to clone; every request binds its own feed
/// against the same entry table, so concurrent requests for one token share
/// a single upstream fetch.
#[derive(Clone, Debug)]
pub struct AppState {
    pub cache: PortfolioCache,
    /// Upper bound on how long a request waits for a fetch to settle
    pub settle_timeout: Duration,
}

impl AppState {
    /// Creates a new AppState around an existing cache.
    pub fn new(cache: PortfolioCache, settle_timeout: Duration) -> Self {
        Self {
            cache,
            settle_timeout,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Builds the HTTP portfolio source and the cache on the current runtime.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = HttpPortfolioSource::new(
            config.portfolio_api_url.clone(),
            Duration::from_secs(config.request_timeout),
        )?;
        let cache = portfolio_cache(source, config.cache_options());
        Ok(Self::new(cache, config.settle_timeout()))
    }

    async fn wait_settled(&self, feed: &PortfolioFeed) -> PortfolioView {
        match tokio::time::timeout(self.settle_timeout, feed.settled()).await {
            Ok(view) => view,
            Err(_) => {
                warn!(
                    "Portfolio fetch still running after {:?}, answering with current state",
                    self.settle_timeout
                );
                feed.view()
            }
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
///
/// A missing header, another scheme or a blank token all yield `None`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

fn respond(view: PortfolioView) -> Result<Json<PortfolioResponse>> {
    // Without data to fall back on, a failed fetch is the answer
    if view.portfolio.is_none() {
        if let Some(err) = view.error.clone() {
            return Err(CacheError::Fetch(err));
        }
    }
    Ok(Json(view.into()))
}

/// Handler for GET /portfolio
///
/// Returns the cached portfolio immediately when there is one; background
/// revalidation continues. With nothing cached yet, waits for the first
/// fetch (bounded by the settle timeout).
pub async fn portfolio_handler(
    State(state): State<AppState>,
    Query(query): Query<PortfolioQuery>,
    headers: HeaderMap,
) -> Result<Json<PortfolioResponse>> {
    let feed = PortfolioFeed::new(state.cache.clone(), bearer_token(&headers).unwrap_or(""))?;

    if !feed.is_active() {
        debug!("No bearer token, returning inactive view");
        return respond(feed.view());
    }

    let current = feed.view();
    let view = if query.wait || current.portfolio.is_none() {
        state.wait_settled(&feed).await
    } else {
        current
    };

    respond(view)
}

/// Handler for POST /portfolio/refresh
///
/// Forces a revalidation for the caller's token and waits for it.
pub async fn refresh_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PortfolioResponse>> {
    let feed = PortfolioFeed::new(state.cache.clone(), bearer_token(&headers).unwrap_or(""))?;

    if !feed.is_active() {
        return respond(feed.view());
    }

    if !feed.refresh() {
        debug!("Refresh joined an in-flight fetch");
    }

    respond(state.wait_settled(&feed).await)
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.cache.stats().into())
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::test_options;
    use crate::error::FetchError;
    use crate::portfolio::{PortfolioSnapshot, PortfolioSource};
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PortfolioSource for CountingSource {
        async fn fetch(&self, token: &str) -> std::result::Result<PortfolioSnapshot, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(100)).await;
            match token {
                "revoked" => return Err(FetchError::Auth("token revoked".to_string())),
                "slow" => tokio::time::sleep(Duration::from_secs(60)).await,
                _ => {}
            }
            Ok(PortfolioSnapshot {
                positions: Vec::new(),
                total_value: n as f64,
                currency: "USD".to_string(),
            })
        }
    }

    fn state_with(source: &Arc<CountingSource>) -> AppState {
        let cache = portfolio_cache(Arc::clone(source), test_options());
        AppState::new(cache, Duration::from_secs(5))
    }

    fn auth(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&auth("t.abc")), Some("t.abc"));
        assert_eq!(bearer_token(&auth("  ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);

        let mut basic = HeaderMap::new();
        basic.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(bearer_token(&basic), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_portfolio_without_token_is_inactive() {
        let source = Arc::new(CountingSource::default());
        let state = state_with(&source);

        let response = portfolio_handler(
            State(state.clone()),
            Query(PortfolioQuery::default()),
            HeaderMap::new(),
        )
        .await
        .unwrap();

        assert!(response.portfolio.is_none());
        assert!(!response.is_loading);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(state.cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_portfolio_waits_for_first_fetch_then_serves_cache() {
        let source = Arc::new(CountingSource::default());
        let state = state_with(&source);

        let first = portfolio_handler(
            State(state.clone()),
            Query(PortfolioQuery::default()),
            auth("t.good"),
        )
        .await
        .unwrap();
        assert_eq!(first.portfolio.as_ref().unwrap().total_value, 1.0);
        assert!(!first.is_validating);

        // Still fresh: served from cache without another upstream call
        let second = portfolio_handler(
            State(state.clone()),
            Query(PortfolioQuery::default()),
            auth("t.good"),
        )
        .await
        .unwrap();
        assert_eq!(second.portfolio.as_ref().unwrap().total_value, 1.0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_portfolio_auth_failure_is_error() {
        let source = Arc::new(CountingSource::default());
        let state = state_with(&source);

        let err = portfolio_handler(
            State(state),
            Query(PortfolioQuery::default()),
            auth("revoked"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CacheError::Fetch(FetchError::Auth(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_portfolio_settle_timeout_returns_loading_view() {
        let source = Arc::new(CountingSource::default());
        let state = state_with(&source);

        let response = portfolio_handler(
            State(state),
            Query(PortfolioQuery::default()),
            auth("slow"),
        )
        .await
        .unwrap();

        assert!(response.portfolio.is_none());
        assert!(response.is_loading);
        assert!(response.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_fetches_again() {
        let source = Arc::new(CountingSource::default());
        let state = state_with(&source);

        portfolio_handler(
            State(state.clone()),
            Query(PortfolioQuery::default()),
            auth("t.good"),
        )
        .await
        .unwrap();

        let refreshed = refresh_handler(State(state.clone()), auth("t.good"))
            .await
            .unwrap();
        assert_eq!(refreshed.portfolio.as_ref().unwrap().total_value, 2.0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_handler_counts_fetches() {
        let source = Arc::new(CountingSource::default());
        let state = state_with(&source);

        portfolio_handler(
            State(state.clone()),
            Query(PortfolioQuery::default()),
            auth("t.good"),
        )
        .await
        .unwrap();

        let response = stats_handler(State(state)).await;
        assert_eq!(response.stats.fetches_started, 1);
        assert_eq!(response.stats.fetch_successes, 1);
        assert_eq!(response.failure_rate, 0.0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
