//! Portfolio SWR - a stale-while-revalidate portfolio cache
//!
//! A keyed fetch cache with request deduplication, per-key interval
//! revalidation and optimistic mutation, a subscription binding that turns it
//! into a reactive `{data, is_loading, error}` view, and an HTTP server that
//! serves brokerage portfolios through it.

pub mod api;
pub mod binding;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod portfolio;
pub mod tasks;

pub use api::AppState;
pub use binding::{BindingView, SubscriptionBinding};
pub use cache::{CacheOptions, FetchCache};
pub use config::Config;
pub use error::{CacheError, FetchError};
pub use portfolio::{PortfolioFeed, PortfolioView};
pub use tasks::spawn_eviction_task;
