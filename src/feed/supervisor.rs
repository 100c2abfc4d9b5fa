use super::{SampleSource, SourceKind};
use crate::error::{FeedError, Result};
use crate::models::FeedBatch;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

/// Linear backoff for push reconnects: attempt `n` waits `base * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(3),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base * attempt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    Push,
    Polling,
}

/// Chooses between a push source and the poll fallback.
///
/// Push is preferred. When it fails the supervisor reconnects with
/// [`ReconnectPolicy`] backoff; once `max_attempts` is exhausted it drops the
/// push source and polls for the rest of the session.
pub struct FeedSupervisor {
    push: Option<Box<dyn SampleSource>>,
    poll: Box<dyn SampleSource>,
    policy: ReconnectPolicy,
    mode: FeedMode,
    attempts: u32,
    disposed: bool,
}

impl FeedSupervisor {
    pub fn new(
        push: Option<Box<dyn SampleSource>>,
        poll: Box<dyn SampleSource>,
        policy: ReconnectPolicy,
    ) -> Self {
        debug_assert_eq!(poll.kind(), SourceKind::Poll);
        Self {
            push,
            poll,
            policy,
            mode: FeedMode::Polling,
            attempts: 0,
            disposed: false,
        }
    }

    pub fn mode(&self) -> FeedMode {
        self.mode
    }

    pub async fn start(&mut self) {
        let connected = match self.push.as_mut() {
            Some(push) => match push.connect().await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Push feed unavailable: {}", e);
                    false
                }
            },
            None => {
                info!("No push feed configured, polling");
                self.fall_back().await;
                return;
            }
        };

        self.mode = FeedMode::Push;
        if connected {
            info!("Push feed connected");
        } else {
            self.reconnect().await;
        }
    }

    /// Next delivery from whichever source is active.
    pub async fn next_batch(&mut self) -> Result<FeedBatch> {
        loop {
            if self.disposed {
                return Err(FeedError::Disconnected);
            }

            let result = match (self.mode, self.push.as_mut()) {
                (FeedMode::Push, Some(push)) => push.next_batch().await,
                _ => return self.poll.next_batch().await,
            };

            match result {
                Ok(batch) => {
                    self.attempts = 0;
                    return Ok(batch);
                }
                Err(e) => {
                    error!("Push feed failed: {}", e);
                    self.reconnect().await;
                }
            }
        }
    }

    /// Retries the push connection until it succeeds or attempts run out.
    pub async fn reconnect(&mut self) {
        loop {
            if self.mode != FeedMode::Push || self.push.is_none() {
                return;
            }

            self.attempts += 1;
            if self.attempts > self.policy.max_attempts {
                warn!(
                    "Push feed failed {} reconnect attempts, switching to polling",
                    self.policy.max_attempts
                );
                self.fall_back().await;
                return;
            }

            let delay = self.policy.delay_for(self.attempts);
            info!(
                "Reconnecting push feed in {:?} (attempt {}/{})",
                delay, self.attempts, self.policy.max_attempts
            );
            tokio::time::sleep(delay).await;

            if let Some(push) = self.push.as_mut() {
                match push.connect().await {
                    Ok(()) => {
                        info!("Push feed reconnected");
                        return;
                    }
                    Err(e) => warn!("Reconnect attempt {} failed: {}", self.attempts, e),
                }
            }
        }
    }

    async fn fall_back(&mut self) {
        if let Some(mut push) = self.push.take() {
            push.dispose().await;
        }
        self.mode = FeedMode::Polling;
        if let Err(e) = self.poll.connect().await {
            error!("Poll source failed to start: {}", e);
        }
    }

    /// Pumps batches into `batches` until `stop` fires, the receiver goes
    /// away or the feed fails, then disposes the feed.
    ///
    /// Meant to run in its own task: timers on the consuming side never
    /// cancel an in-flight fetch or reconnect backoff.
    pub async fn forward(mut self, batches: mpsc::Sender<FeedBatch>, mut stop: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                batch = self.next_batch() => match batch {
                    Ok(batch) => {
                        if batches.send(batch).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Feed stopped: {}", e);
                        break;
                    }
                },
                _ = &mut stop => break,
            }
        }
        self.dispose().await;
    }

    pub async fn dispose(&mut self) {
        self.disposed = true;
        if let Some(push) = self.push.as_mut() {
            push.dispose().await;
        }
        self.poll.dispose().await;
        info!("Feed disposed");
    }
}
