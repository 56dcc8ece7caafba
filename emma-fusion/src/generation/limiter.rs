//! Minimum spacing between upstream calls

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum interval between consecutive calls
///
/// The first call goes through immediately. Holding the lock across the
/// sleep means concurrent callers queue up instead of bursting.
#[derive(Debug)]
pub struct Cooldown {
    last_call: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl Cooldown {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: Mutex::new(None),
            min_interval,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait if necessary, then mark a call as starting now
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!("Cooling down for {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}
