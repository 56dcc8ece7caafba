//! Fusion run progress events
//!
//! Emitted over an optional `mpsc` channel so a caller (CLI, server) can
//! report progress while the run is underway.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FusionEvent {
    /// Run accepted its input and is about to call upstream
    RunStarted {
        run_id: Uuid,
        module: String,
        total_segments: usize,
        /// Unix timestamp (seconds since epoch)
        timestamp: i64,
    },

    /// Segment analysis is starting
    SegmentStarted { index: u32, total_segments: usize },

    /// Segment analyzed, scored and persisted
    SegmentCompleted {
        index: u32,
        fusion_score: u8,
        attempts: u32,
        artifact: String,
    },

    /// Segment analysis failed after all attempts
    SegmentFailed {
        index: u32,
        attempts: u32,
        message: String,
    },

    /// Summary artifact persisted
    SummaryWritten { artifact: String, average_score: f64 },

    /// Run ended, successfully or not
    RunFinished {
        run_id: Uuid,
        completed: usize,
        failed: usize,
        /// Unix timestamp (seconds since epoch)
        timestamp: i64,
    },
}

/// Log every event as JSON at DEBUG until all senders are dropped
///
/// The handle resolves to the number of events received.
pub fn spawn_event_logger(mut rx: mpsc::Receiver<FusionEvent>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut received = 0;
        while let Some(event) = rx.recv().await {
            received += 1;
            match serde_json::to_string(&event) {
                Ok(json) => debug!(target: "emma_fusion::events", "{}", json),
                Err(e) => warn!("Failed to serialize fusion event: {}", e),
            }
        }
        received
    })
}
