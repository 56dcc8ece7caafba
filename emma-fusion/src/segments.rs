//! Segment sources
//!
//! A source document is pre-split into numbered markdown files
//! (`segment_01.md`, `segment_02.md`, ...). A fusion run reads the whole
//! ordered sequence once, before any upstream call is made.

use crate::error::SegmentError;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One numbered chunk of a larger source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// 1-based position in the document
    pub index: u32,
    pub source_text: String,
}

impl Segment {
    pub fn new(index: u32, source_text: impl Into<String>) -> Self {
        Self {
            index,
            source_text: source_text.into(),
        }
    }

    /// On-disk filename for a segment index
    pub fn file_name(index: u32) -> String {
        format!("segment_{:02}.md", index)
    }

    /// Source text cut to at most `max_chars` characters (never splits a char)
    pub fn truncated_text(&self, max_chars: usize) -> &str {
        match self.source_text.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => &self.source_text[..byte_idx],
            None => &self.source_text,
        }
    }
}

/// Number texts 1..N in iteration order
pub fn segments_from_texts<I, S>(texts: I) -> Vec<Segment>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    texts
        .into_iter()
        .zip(1u32..)
        .map(|(text, index)| Segment::new(index, text))
        .collect()
}

/// Check that indices run 1, 2, ..., N in order
pub fn validate_contiguous(segments: &[Segment]) -> Result<(), SegmentError> {
    if segments.is_empty() {
        return Err(SegmentError::Empty("segment list".to_string()));
    }
    for (segment, expected) in segments.iter().zip(1u32..) {
        if segment.index != expected {
            return Err(SegmentError::Gap {
                expected,
                found: segment.index,
            });
        }
    }
    Ok(())
}

/// Read-only provider of ordered segments
#[async_trait]
pub trait SegmentSource: Send + Sync {
    /// Human-readable origin for logs
    fn describe(&self) -> String;

    /// Load every segment, in index order
    async fn load(&self) -> Result<Vec<Segment>, SegmentError>;
}

/// Segments stored as `segment_NN.md` files in one directory
pub struct DirectorySegmentSource {
    dir: PathBuf,
    expected: Option<u32>,
}

impl DirectorySegmentSource {
    /// Discover the segment count from the highest index on disk
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            expected: None,
        }
    }

    /// Require exactly `count` segments
    pub fn with_expected_count(mut self, count: u32) -> Self {
        self.expected = Some(count);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn discover_count(&self) -> Result<u32, SegmentError> {
        let mut entries =
            tokio::fs::read_dir(&self.dir)
                .await
                .map_err(|source| SegmentError::Listing {
                    path: self.dir.clone(),
                    source,
                })?;

        let mut highest = 0u32;
        loop {
            let entry = entries
                .next_entry()
                .await
                .map_err(|source| SegmentError::Listing {
                    path: self.dir.clone(),
                    source,
                })?;
            let Some(entry) = entry else { break };
            if let Some(index) = entry.file_name().to_str().and_then(parse_segment_index) {
                highest = highest.max(index);
            }
        }
        Ok(highest)
    }
}

#[async_trait]
impl SegmentSource for DirectorySegmentSource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    async fn load(&self) -> Result<Vec<Segment>, SegmentError> {
        let count = match self.expected {
            Some(count) => count,
            None => self.discover_count().await?,
        };
        if count == 0 {
            return Err(SegmentError::Empty(self.describe()));
        }

        let mut segments = Vec::with_capacity(count as usize);
        for index in 1..=count {
            let path = self.dir.join(Segment::file_name(index));
            let text = tokio::fs::read_to_string(&path).await.map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    SegmentError::Missing {
                        index,
                        path: path.clone(),
                    }
                } else {
                    SegmentError::Io {
                        index,
                        path: path.clone(),
                        source,
                    }
                }
            })?;
            debug!(segment = index, chars = text.chars().count(), "Loaded segment");
            segments.push(Segment::new(index, text));
        }

        info!(count, dir = %self.dir.display(), "Segments loaded");
        Ok(segments)
    }
}

/// `segment_07.md` -> 7
fn parse_segment_index(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("segment_")?.strip_suffix(".md")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|&index| index > 0)
}
