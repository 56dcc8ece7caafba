//! emma-fusion library interface
//!
//! Segment loading, upstream generation clients, score extraction and the
//! sequential fusion aggregator. The `emma-fusion` binary wires these
//! together from configuration.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod generation;
pub mod prompt;
pub mod score;
pub mod segments;

pub use crate::aggregator::{
    FailurePolicy, FusionAggregator, FusionEvent, FusionSummary, PartialFailure, SegmentFailure,
    SegmentResult,
};
pub use crate::error::{FusionError, GenerationError, SegmentError};
pub use crate::generation::{GenerationClient, RetryPolicy};
pub use crate::score::ScoreExtractor;
pub use crate::segments::{DirectorySegmentSource, Segment, SegmentSource};
