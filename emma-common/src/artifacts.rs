//! Markdown artifact storage
//!
//! Fusion runs persist their per-segment and summary reports as markdown
//! files in a single flat directory. The dashboard reads the same directory
//! to find the most recent report and to serve individual files.
//!
//! Writes go to a hidden temp file first and are renamed into place, so a
//! reader scanning the directory never sees a half-written artifact.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Route prefix under which the dashboard serves artifact files
pub const ARTIFACT_URL_PREFIX: &str = "/api/dashboard/fusion/file";

/// Description of one artifact file, recomputed on every lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMeta {
    pub filename: String,
    /// Dashboard URL serving this file
    pub url: String,
    pub modified_at: DateTime<Utc>,
}

/// Flat directory of markdown artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `content` as `name`, replacing any existing artifact of that name
    ///
    /// Filesystem failures are returned to the caller untouched.
    pub async fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        validate_name(name)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let target = self.dir.join(name);
        let temp = self.dir.join(format!(".{}.tmp", name));

        let written = match tokio::fs::write(&temp, content).await {
            Ok(()) => tokio::fs::rename(&temp, &target).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            // A short write or failed rename must not leave the temp file behind
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(artifact = %target.display(), bytes = content.len(), "Artifact written");
        Ok(target)
    }

    /// Most recently modified artifact whose name ends with `suffix`
    pub async fn latest(&self, suffix: &str) -> Result<Option<ArtifactMeta>> {
        latest_matching(&self.dir, suffix).await
    }

    /// Resolve a requested filename to a file inside this store
    ///
    /// Rejects anything that is not a single plain path component, and
    /// anything whose canonical path (after following symlinks) lands
    /// outside the store directory.
    pub async fn resolve(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;

        let base = canonical(&self.dir, "artifact directory").await?;
        let resolved = canonical(&base.join(name), name).await?;

        if !resolved.starts_with(&base) {
            return Err(Error::InvalidInput(format!(
                "{} resolves outside the artifact directory",
                name
            )));
        }

        let meta = tokio::fs::metadata(&resolved).await?;
        if !meta.is_file() {
            return Err(Error::NotFound(name.to_string()));
        }

        Ok(resolved)
    }
}

/// Scan `dir` (non-recursively) for the newest file ending with `suffix`
///
/// Returns `None` when the directory does not exist or nothing matches.
/// When two files share a modification time, the lexicographically greater
/// filename wins, so the answer does not depend on directory order.
pub async fn latest_matching(dir: &Path, suffix: &str) -> Result<Option<ArtifactMeta>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Artifact directory does not exist");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let mut best: Option<(SystemTime, String)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !name.ends_with(suffix) {
            continue;
        }

        // Entry may vanish between listing and stat
        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(e) => {
                debug!(file = %name, error = %e, "Skipping unreadable artifact");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified()?;

        let newer = match &best {
            None => true,
            Some((best_time, best_name)) => (modified, &name) > (*best_time, best_name),
        };
        if newer {
            best = Some((modified, name));
        }
    }

    Ok(best.map(|(modified, filename)| ArtifactMeta {
        url: artifact_url(&filename),
        modified_at: DateTime::<Utc>::from(modified),
        filename,
    }))
}

/// Dashboard URL for an artifact filename
pub fn artifact_url(filename: &str) -> String {
    format!("{}/{}", ARTIFACT_URL_PREFIX, urlencoding::encode(filename))
}

/// Artifact names must be one normal path component
fn validate_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(&['/', '\\'][..]) => Ok(()),
        _ => Err(Error::InvalidInput(format!(
            "invalid artifact name: {:?}",
            name
        ))),
    }
}

async fn canonical(path: &Path, label: &str) -> Result<PathBuf> {
    tokio::fs::canonicalize(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(label.to_string())
        } else {
            Error::Io(e)
        }
    })
}
