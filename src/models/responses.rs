//! Response DTOs for the portfolio API
//!
//! Defines the structure of outgoing HTTP response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::portfolio::{PortfolioSnapshot, PortfolioView};

/// Response body for `GET /portfolio` and `POST /portfolio/refresh`
///
/// `portfolio` may be stale while `is_validating` is set, and may coexist
/// with `error` when the last revalidation failed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResponse {
    pub portfolio: Option<PortfolioSnapshot>,
    pub is_loading: bool,
    pub is_validating: bool,
    pub error: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl From<PortfolioView> for PortfolioResponse {
    fn from(view: PortfolioView) -> Self {
        Self {
            portfolio: view.portfolio.as_deref().cloned(),
            is_loading: view.is_loading,
            is_validating: view.is_validating,
            error: view.error.map(|err| err.to_string()),
            fetched_at: view.fetched_at,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// failures / (successes + failures)
    pub failure_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            failure_rate: stats.failure_rate(),
            stats,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
