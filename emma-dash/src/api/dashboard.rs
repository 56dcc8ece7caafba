//! Dashboard snapshot endpoints
//!
//! Snapshot reads never fail: a stale or empty domain is refreshed inline
//! and its sources degrade to defaults.

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::Value;

use crate::cache::{Domain, RefreshTrigger};
use crate::sources::{check_sources, SourceAvailability};
use crate::AppState;

async fn snapshot(state: &AppState, domain: Domain) -> Json<Value> {
    let entry = state.cache.get(domain).await;
    Json(entry.data.clone())
}

/// GET /api/dashboard/status
pub async fn get_status(State(state): State<AppState>) -> Json<Value> {
    snapshot(&state, Domain::Status).await
}

/// GET /api/dashboard/revenue
pub async fn get_revenue(State(state): State<AppState>) -> Json<Value> {
    snapshot(&state, Domain::Revenue).await
}

/// GET /api/dashboard/fusion
pub async fn get_fusion(State(state): State<AppState>) -> Json<Value> {
    snapshot(&state, Domain::Fusion).await
}

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub ok: bool,
    pub status: &'static str,
    pub sources: SourceAvailability,
}

/// GET /api/dashboard/sources
pub async fn get_sources(State(state): State<AppState>) -> Json<SourcesResponse> {
    let sources = check_sources(&state.layout).await;
    let ok = sources.all_available();
    Json(SourcesResponse {
        ok,
        status: if ok { "healthy" } else { "degraded" },
        sources,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub trigger: RefreshTrigger,
    pub refreshed: Vec<Domain>,
    pub updated_at: String,
}

/// POST /api/dashboard/refresh
pub async fn post_refresh(State(state): State<AppState>) -> Json<RefreshResponse> {
    let entries = state.cache.refresh_all(RefreshTrigger::Manual).await;
    let updated_at = entries
        .iter()
        .map(|e| e.updated_at)
        .max()
        .unwrap_or_else(emma_common::time::now);

    Json(RefreshResponse {
        trigger: RefreshTrigger::Manual,
        refreshed: entries.iter().map(|e| e.domain).collect(),
        updated_at: emma_common::time::iso(updated_at),
    })
}
