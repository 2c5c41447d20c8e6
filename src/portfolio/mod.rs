//! Portfolio Module
//!
//! The brokerage-specific side: snapshot types, the token-derived cache key,
//! the upstream source, and the feed consumers bind to.

mod feed;
mod http;
mod key;
mod model;
mod source;

pub use feed::{PortfolioFeed, PortfolioView};
pub use http::{parse_portfolio, HttpPortfolioSource};
pub use key::PortfolioKey;
pub use model::{PortfolioSnapshot, Position};
pub use source::{portfolio_cache, PortfolioCache, PortfolioSource, SourceFetcher};
