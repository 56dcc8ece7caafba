//! # Emma Common Library
//!
//! Shared code for the Emma fusion pipeline and dashboard server:
//! - Error type shared by both binaries
//! - Configuration loading and root folder layout
//! - Markdown artifact storage and "latest artifact" lookup
//! - Timestamp helpers

pub mod artifacts;
pub mod config;
pub mod error;
pub mod time;

pub use artifacts::{ArtifactMeta, ArtifactStore};
pub use error::{Error, Result};
