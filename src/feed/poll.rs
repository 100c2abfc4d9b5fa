use super::mock;
use super::{PositionApi, SampleSource, SourceKind};
use crate::error::{FeedError, Result};
use crate::models::FeedBatch;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Periodically fetches the latest positions over the REST API.
///
/// Upstream failures never reach the caller: the demo dataset from
/// [`mock`] is served instead and a warning is logged.
pub struct PollSource<A: PositionApi> {
    api: Arc<A>,
    ticker: Interval,
    devices_loaded: bool,
    disposed: bool,
}

impl<A: PositionApi> PollSource<A> {
    pub fn new(api: Arc<A>, period: Duration) -> Self {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            api,
            ticker,
            devices_loaded: false,
            disposed: false,
        }
    }

    async fn fetch(&mut self) -> FeedBatch {
        let mut batch = FeedBatch::default();

        if !self.devices_loaded {
            match self.api.get_devices().await {
                Ok(devices) => {
                    info!("Loaded {} devices", devices.len());
                    batch.devices = devices;
                    self.devices_loaded = true;
                }
                Err(e) => {
                    warn!("Failed to fetch devices, using demo fleet: {}", e);
                    batch.devices = mock::devices();
                }
            }
        }

        batch.samples = match self.api.get_positions(None).await {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Failed to fetch positions, using demo positions: {}", e);
                mock::positions(Utc::now())
            }
        };
        batch
    }
}

#[async_trait]
impl<A: PositionApi + 'static> SampleSource for PollSource<A> {
    fn kind(&self) -> SourceKind {
        SourceKind::Poll
    }

    async fn connect(&mut self) -> Result<()> {
        self.disposed = false;
        Ok(())
    }

    async fn next_batch(&mut self) -> Result<FeedBatch> {
        if self.disposed {
            return Err(FeedError::Disconnected);
        }
        self.ticker.tick().await;
        Ok(self.fetch().await)
    }

    async fn dispose(&mut self) {
        self.disposed = true;
    }
}
