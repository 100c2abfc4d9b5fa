//! Derived alerts and driving-event detection for a GPS fleet.
//!
//! Position samples arrive from a push feed (Kafka) or a polled REST API,
//! pass through the [`engine::AlertEngine`] and come out as deduplicated
//! [`models::AlertEvent`]s.

pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod models;
pub mod processor;

pub use engine::{AlertEngine, EngineConfig};
pub use error::{DecodeError, FeedError};
