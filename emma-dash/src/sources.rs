//! Refresh sources for the dashboard domains
//!
//! - status: division list and system health from `data/memo_index.json`
//! - revenue: figures from `data/revenue_snapshot.json`
//! - fusion: the most recent artifact in `data/fusion_reports/`
//!
//! A missing or corrupt file degrades to that domain's default payload.

use crate::cache::{Domain, RefreshTrigger, SnapshotSource};
use async_trait::async_trait;
use emma_common::config::RootLayout;
use emma_common::{ArtifactMeta, ArtifactStore};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Read and parse a JSON file, falling back to `T::default()`
///
/// A missing file is expected before the first export and logs at DEBUG;
/// unreadable or malformed content logs at WARN.
pub async fn read_json_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(file = %path.display(), "Snapshot source not found, using defaults");
            return T::default();
        }
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Failed to read snapshot source, using defaults");
            return T::default();
        }
    };

    match serde_json::from_slice(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Malformed snapshot source, using defaults");
            T::default()
        }
    }
}

/// Shape of `memo_index.json`
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoIndex {
    pub divisions: Vec<Value>,
    pub scheduler_last_run: Option<String>,
    pub disk_sync_status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SystemHealth<'a> {
    scheduler_last_run: Option<String>,
    disk_sync_status: String,
    source: &'a str,
}

/// Status domain: divisions plus system health
pub struct StatusSource {
    memo_index: PathBuf,
}

impl StatusSource {
    pub fn new(memo_index: impl Into<PathBuf>) -> Self {
        Self {
            memo_index: memo_index.into(),
        }
    }
}

#[async_trait]
impl SnapshotSource for StatusSource {
    async fn refresh(&self, trigger: RefreshTrigger) -> Value {
        let index: MemoIndex = read_json_or_default(&self.memo_index).await;
        json!({
            "divisions": index.divisions,
            "systemHealth": SystemHealth {
                scheduler_last_run: index.scheduler_last_run,
                disk_sync_status: index
                    .disk_sync_status
                    .unwrap_or_else(|| "unknown".to_string()),
                source: trigger.as_str(),
            },
        })
    }
}

/// Shape of `revenue_snapshot.json`; every field defaults to zero/empty
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RevenueSnapshot {
    pub mrr: f64,
    pub total_report_sales: f64,
    pub yoy_growth: f64,
    pub sparkline: Vec<f64>,
}

/// Revenue domain
pub struct RevenueSource {
    snapshot: PathBuf,
}

impl RevenueSource {
    pub fn new(snapshot: impl Into<PathBuf>) -> Self {
        Self {
            snapshot: snapshot.into(),
        }
    }
}

#[async_trait]
impl SnapshotSource for RevenueSource {
    async fn refresh(&self, trigger: RefreshTrigger) -> Value {
        let revenue: RevenueSnapshot = read_json_or_default(&self.snapshot).await;
        let mut data = serde_json::to_value(revenue).unwrap_or_else(|_| json!({}));
        if let Value::Object(map) = &mut data {
            map.insert("source".to_string(), json!(trigger.as_str()));
        }
        data
    }
}

/// Fusion domain: newest artifact matching the report suffix
pub struct FusionSource {
    store: ArtifactStore,
    suffix: String,
}

impl FusionSource {
    pub fn new(store: ArtifactStore, suffix: impl Into<String>) -> Self {
        Self {
            store,
            suffix: suffix.into(),
        }
    }

    async fn latest(&self) -> Option<ArtifactMeta> {
        match self.store.latest(&self.suffix).await {
            Ok(latest) => latest,
            Err(e) => {
                warn!(
                    dir = %self.store.dir().display(),
                    error = %e,
                    "Failed to scan fusion reports, reporting none"
                );
                None
            }
        }
    }
}

#[async_trait]
impl SnapshotSource for FusionSource {
    async fn refresh(&self, trigger: RefreshTrigger) -> Value {
        let latest = self.latest().await;
        json!({
            "hasReport": latest.is_some(),
            "latest": latest,
            "source": trigger.as_str(),
        })
    }
}

/// Standard sources for a root folder
pub fn default_sources(
    layout: &RootLayout,
    store: &ArtifactStore,
    report_suffix: &str,
) -> Vec<(Domain, Arc<dyn SnapshotSource>)> {
    let status: Arc<dyn SnapshotSource> = Arc::new(StatusSource::new(layout.memo_index_path()));
    let revenue: Arc<dyn SnapshotSource> =
        Arc::new(RevenueSource::new(layout.revenue_snapshot_path()));
    let fusion: Arc<dyn SnapshotSource> =
        Arc::new(FusionSource::new(store.clone(), report_suffix));

    vec![
        (Domain::Status, status),
        (Domain::Revenue, revenue),
        (Domain::Fusion, fusion),
    ]
}

/// Presence of each backing source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAvailability {
    pub memo_index: bool,
    pub revenue_snapshot: bool,
    pub fusion_reports: bool,
}

impl SourceAvailability {
    pub fn all_available(&self) -> bool {
        self.memo_index && self.revenue_snapshot && self.fusion_reports
    }
}

/// Check which backing sources exist under `layout`
pub async fn check_sources(layout: &RootLayout) -> SourceAvailability {
    SourceAvailability {
        memo_index: is_file(&layout.memo_index_path()).await,
        revenue_snapshot: is_file(&layout.revenue_snapshot_path()).await,
        fusion_reports: tokio::fs::metadata(layout.fusion_reports_dir())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false),
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout() -> (TempDir, RootLayout) {
        let dir = TempDir::new().unwrap();
        let layout = RootLayout::new(dir.path());
        std::fs::create_dir_all(layout.data_dir()).unwrap();
        (dir, layout)
    }

    #[tokio::test]
    async fn test_status_defaults_when_missing() {
        let (_dir, layout) = layout();
        let data = StatusSource::new(layout.memo_index_path())
            .refresh(RefreshTrigger::Startup)
            .await;

        assert_eq!(data["divisions"], json!([]));
        assert_eq!(data["systemHealth"]["diskSyncStatus"], "unknown");
        assert!(data["systemHealth"]["schedulerLastRun"].is_null());
        assert_eq!(data["systemHealth"]["source"], "startup");
    }

    #[tokio::test]
    async fn test_status_reads_memo_index() {
        let (_dir, layout) = layout();
        std::fs::write(
            layout.memo_index_path(),
            r#"{"divisions":[{"name":"Research"}],"schedulerLastRun":"2025-11-09T08:00:00Z","diskSyncStatus":"OK"}"#,
        )
        .unwrap();

        let data = StatusSource::new(layout.memo_index_path())
            .refresh(RefreshTrigger::Scheduled)
            .await;

        assert_eq!(data["divisions"][0]["name"], "Research");
        assert_eq!(data["systemHealth"]["schedulerLastRun"], "2025-11-09T08:00:00Z");
        assert_eq!(data["systemHealth"]["diskSyncStatus"], "OK");
    }

    #[tokio::test]
    async fn test_revenue_corrupt_file_degrades_to_zero() {
        let (_dir, layout) = layout();
        std::fs::write(layout.revenue_snapshot_path(), "{ not json").unwrap();

        let data = RevenueSource::new(layout.revenue_snapshot_path())
            .refresh(RefreshTrigger::OnDemand)
            .await;

        assert_eq!(data["mrr"], 0.0);
        assert_eq!(data["totalReportSales"], 0.0);
        assert_eq!(data["yoyGrowth"], 0.0);
        assert_eq!(data["sparkline"], json!([]));
        assert_eq!(data["source"], "on-demand");
    }

    #[tokio::test]
    async fn test_revenue_partial_file_fills_defaults() {
        let (_dir, layout) = layout();
        std::fs::write(layout.revenue_snapshot_path(), r#"{"mrr": 12500, "sparkline": [1, 2, 3]}"#)
            .unwrap();

        let revenue: RevenueSnapshot = read_json_or_default(&layout.revenue_snapshot_path()).await;
        assert_eq!(revenue.mrr, 12500.0);
        assert_eq!(revenue.yoy_growth, 0.0);
        assert_eq!(revenue.sparkline, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_fusion_without_reports() {
        let (_dir, layout) = layout();
        let data = FusionSource::new(ArtifactStore::new(layout.fusion_reports_dir()), ".md")
            .refresh(RefreshTrigger::Manual)
            .await;

        assert_eq!(data["hasReport"], false);
        assert!(data["latest"].is_null());
    }

    #[tokio::test]
    async fn test_fusion_reports_latest() {
        let (_dir, layout) = layout();
        let store = ArtifactStore::new(layout.fusion_reports_dir());
        store.write("fusion-summary-openai-2025-11-09.md", "# Summary").await.unwrap();

        let data = FusionSource::new(store, ".md").refresh(RefreshTrigger::Manual).await;

        assert_eq!(data["hasReport"], true);
        assert_eq!(data["latest"]["filename"], "fusion-summary-openai-2025-11-09.md");
        assert_eq!(
            data["latest"]["url"],
            "/api/dashboard/fusion/file/fusion-summary-openai-2025-11-09.md"
        );
    }

    #[tokio::test]
    async fn test_check_sources() {
        let (_dir, layout) = layout();
        let before = check_sources(&layout).await;
        assert!(!before.all_available());

        std::fs::write(layout.memo_index_path(), "{}").unwrap();
        std::fs::write(layout.revenue_snapshot_path(), "{}").unwrap();
        layout.ensure_directories().unwrap();

        let after = check_sources(&layout).await;
        assert!(after.all_available());
    }
}
