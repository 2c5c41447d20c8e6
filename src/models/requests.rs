//! Request DTOs for the portfolio API
//!
//! Defines the structure of incoming query parameters.

use serde::Deserialize;

/// Query string for `GET /portfolio` and `POST /portfolio/refresh`
///
/// # Fields
/// - `wait`: wait for an in-flight revalidation instead of answering with
///   the cached snapshot right away
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortfolioQuery {
    #[serde(default)]
    pub wait: bool,
}
