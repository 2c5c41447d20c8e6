//! API Module
//!
//! HTTP handlers and routing for the portfolio server REST API.
//!
//! # Endpoints
//! - `GET /portfolio` - Cached portfolio for the bearer token
//! - `POST /portfolio/refresh` - Force a revalidation
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
