//! Background snapshot refresh
//!
//! Refreshes every domain once at startup and then on a fixed interval,
//! independent of request traffic, until cancelled.

use crate::cache::{RefreshTrigger, SnapshotCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Default interval between scheduled refreshes
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10 * 60);

pub struct RefreshScheduler {
    cache: Arc<SnapshotCache>,
    interval: Duration,
}

impl RefreshScheduler {
    /// Scheduler firing every `interval` (at least one second)
    pub fn new(cache: Arc<SnapshotCache>, interval: Duration) -> Self {
        Self {
            cache,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run on a background task
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Refresh at startup, then every interval until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut trigger = RefreshTrigger::Startup;

        info!(interval_secs = self.interval.as_secs(), "Snapshot refresh scheduler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.cache.refresh_all(trigger).await;
                    trigger = RefreshTrigger::Scheduled;
                }
            }
        }

        info!("Snapshot refresh scheduler stopped");
    }
}
