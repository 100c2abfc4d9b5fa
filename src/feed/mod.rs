//! Position feed plumbing.
//!
//! A [`SampleSource`] yields batches of devices and samples. Two kinds exist:
//! push sources (a subscription delivering whatever the platform sends) and
//! poll sources (periodic REST fetches). The [`supervisor::FeedSupervisor`]
//! picks between them; the alert engine never knows which one is active.

pub mod api;
pub mod kafka;
pub mod mock;
pub mod poll;
pub mod supervisor;

use crate::error::Result;
use crate::models::FeedBatch;
use async_trait::async_trait;

pub use api::{HttpPositionApi, PositionApi};
pub use kafka::{KafkaSettings, KafkaSource};
pub use poll::PollSource;
pub use supervisor::{FeedMode, FeedSupervisor, ReconnectPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Push,
    Poll,
}

#[async_trait]
pub trait SampleSource: Send {
    fn kind(&self) -> SourceKind;

    /// (Re)establishes the subscription. A no-op for poll sources.
    async fn connect(&mut self) -> Result<()>;

    /// Waits for the next delivery.
    async fn next_batch(&mut self) -> Result<FeedBatch>;

    /// Tears the source down. Further calls to `next_batch` fail.
    async fn dispose(&mut self);
}
