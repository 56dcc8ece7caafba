//! Error types for emma-fusion

use crate::aggregator::PartialFailure;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single call to the upstream generation provider
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Transport failure (connect, TLS, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// No answer within the call timeout
    #[error("Generation call timed out after {0:?}")]
    Timeout(Duration),

    /// Provider answered with a non-success status
    #[error("Upstream returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Provider answered 2xx but the expected text field is missing
    #[error("Malformed upstream payload: {0}")]
    Payload(String),

    /// Client could not be constructed
    #[error("Generation client configuration error: {0}")]
    Config(String),
}

impl GenerationError {
    /// Whether a retry has a chance of succeeding
    ///
    /// Rate limiting (429) and server-side failures (5xx) are retried;
    /// other 4xx, malformed payloads and configuration errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Network(_) | GenerationError::Timeout(_) => true,
            GenerationError::Api { status, .. } => *status == 429 || *status >= 500,
            GenerationError::Payload(_) | GenerationError::Config(_) => false,
        }
    }
}

/// Segment loading errors
#[derive(Debug, Error)]
pub enum SegmentError {
    /// Expected segment file is absent
    #[error("Segment {index} is missing ({path})")]
    Missing { index: u32, path: PathBuf },

    /// Segment file exists but could not be read
    #[error("Failed to read segment {index} ({path}): {source}")]
    Io {
        index: u32,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Segment directory could not be listed
    #[error("Failed to list segments in {path}: {source}")]
    Listing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Indices are not 1..N in order
    #[error("Segment indices must run 1..N without gaps: expected {expected}, found {found}")]
    Gap { expected: u32, found: u32 },

    /// Nothing to process
    #[error("No segments found in {0}")]
    Empty(String),
}

/// Fusion run errors
#[derive(Debug, Error)]
pub enum FusionError {
    /// Input segments were unusable; nothing was sent upstream
    #[error(transparent)]
    Segments(#[from] SegmentError),

    /// An artifact could not be persisted; the run stopped at that step
    #[error("Artifact write failed for {artifact}: {source}")]
    Artifact {
        artifact: String,
        #[source]
        source: emma_common::Error,
    },

    /// One or more segments failed; no summary was produced
    #[error("{0}")]
    Partial(PartialFailure),
}
