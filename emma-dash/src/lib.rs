//! emma-dash library - dashboard snapshot server
//!
//! Serves the status, revenue and fusion dashboard domains from a TTL
//! snapshot cache, plus the fusion report files themselves.

use axum::Router;
use chrono::{DateTime, Utc};
use emma_common::config::RootLayout;
use emma_common::ArtifactStore;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod cache;
pub mod error;
pub mod scheduler;
pub mod sources;

pub use crate::cache::{CacheEntry, Domain, RefreshTrigger, SnapshotCache, SnapshotSource};
pub use crate::error::{ApiError, ApiResult};
pub use crate::scheduler::RefreshScheduler;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<SnapshotCache>,
    /// Fusion reports directory
    pub store: ArtifactStore,
    pub layout: RootLayout,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(cache: Arc<SnapshotCache>, layout: RootLayout) -> Self {
        Self {
            cache,
            store: ArtifactStore::new(layout.fusion_reports_dir()),
            layout,
            startup_time: emma_common::time::now(),
        }
    }

    /// State with the standard domain sources under `layout`
    pub fn with_default_sources(layout: RootLayout, ttl: Duration, report_suffix: &str) -> Self {
        let store = ArtifactStore::new(layout.fusion_reports_dir());
        let sources = sources::default_sources(&layout, &store, report_suffix);
        Self::new(Arc::new(SnapshotCache::new(ttl, sources)), layout)
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let dashboard = Router::new()
        .route("/status", get(api::get_status))
        .route("/revenue", get(api::get_revenue))
        .route("/fusion", get(api::get_fusion))
        .route("/fusion/file/:name", get(api::get_report_file))
        .route("/sources", get(api::get_sources))
        .route("/refresh", post(api::post_refresh));

    Router::new()
        .nest("/api/dashboard", dashboard)
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
