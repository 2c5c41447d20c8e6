//! Error types for the portfolio cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Fetch Error Enum ==
/// Failure reported by a fetch operation.
///
/// The cache stores these opaquely in the entry; only the HTTP layer looks at
/// the variant to pick a status code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport failure or unexpected upstream status
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream rejected the credential
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Upstream answered with a body we could not decode
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The fetch task panicked or was cancelled by the runtime
    #[error("Fetch aborted: {0}")]
    Aborted(String),
}

// == Cache Error Enum ==
/// Unified error type for the cache and its HTTP surface.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key failed validation (caller programming error)
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Fetch failed and there is no cached value to fall back on
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            CacheError::Fetch(FetchError::Auth(_)) => StatusCode::UNAUTHORIZED,
            CacheError::Fetch(FetchError::Network(_)) => StatusCode::BAD_GATEWAY,
            CacheError::Fetch(FetchError::MalformedResponse(_)) => StatusCode::BAD_GATEWAY,
            CacheError::Fetch(FetchError::Aborted(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
