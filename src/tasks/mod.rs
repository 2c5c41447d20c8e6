//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Eviction: drops cache entries nobody subscribed to within the grace window

mod eviction;

pub use eviction::spawn_eviction_task;
