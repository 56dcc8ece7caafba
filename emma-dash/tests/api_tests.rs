//! Integration tests for emma-dash API endpoints
//!
//! Drives the router in-process with `oneshot` over a temporary root folder.

mod common;

use axum::http::StatusCode;
use common::{
    extract_json, extract_text, set_mtime, setup_app, test_request, test_root, test_state,
    write_report,
};
use emma_dash::{build_router, Domain};
use serde_json::json;
use tower::util::ServiceExt;

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (_dir, layout) = test_root();
    let state = test_state(&layout);
    let cache = state.cache.clone();
    let app = build_router(state);

    let response = app.oneshot(test_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "emma-dash");
    assert!(body["version"].is_string());
    assert!(body["uptime_seconds"].as_i64().unwrap() >= 0);

    for domain in Domain::ALL {
        assert_eq!(cache.refresh_count(domain), 0, "health touched {}", domain);
    }
}

// =============================================================================
// Snapshot domains
// =============================================================================

#[tokio::test]
async fn test_status_with_missing_sources_returns_defaults() {
    let (_dir, layout) = test_root();
    let app = setup_app(&layout);

    let response = app
        .oneshot(test_request("GET", "/api/dashboard/status"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["divisions"], json!([]));
    assert_eq!(body["systemHealth"]["diskSyncStatus"], "unknown");
    assert_eq!(body["systemHealth"]["source"], "on-demand");
    assert!(body["updatedAt"].is_string());
}

#[tokio::test]
async fn test_revenue_reads_snapshot_file() {
    let (_dir, layout) = test_root();
    std::fs::write(
        layout.revenue_snapshot_path(),
        r#"{"mrr": 4200, "totalReportSales": 17, "yoyGrowth": 0.12, "sparkline": [1, 2]}"#,
    )
    .unwrap();
    let app = setup_app(&layout);

    let response = app
        .oneshot(test_request("GET", "/api/dashboard/revenue"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["mrr"], 4200.0);
    assert_eq!(body["totalReportSales"], 17.0);
    assert_eq!(body["yoyGrowth"], 0.12);
    assert_eq!(body["sparkline"], json!([1.0, 2.0]));
}

#[tokio::test]
async fn test_fusion_without_reports() {
    let (_dir, layout) = test_root();
    let app = setup_app(&layout);

    let response = app
        .oneshot(test_request("GET", "/api/dashboard/fusion"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;

    assert_eq!(body["hasReport"], false);
    assert!(body["latest"].is_null());
}

#[tokio::test]
async fn test_fusion_reports_most_recent_artifact() {
    let (_dir, layout) = test_root();
    let reports = layout.fusion_reports_dir();
    for (i, name) in ["segment-fusion-01-openai-2025-11-09.md", "fusion-summary-openai-2025-11-09.md", "notes.txt"]
        .iter()
        .enumerate()
    {
        write_report(&layout, name, "# report");
        set_mtime(&reports.join(name), 1_700_000_000 + i as u64 * 60);
    }
    let app = setup_app(&layout);

    let response = app
        .oneshot(test_request("GET", "/api/dashboard/fusion"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;

    assert_eq!(body["hasReport"], true);
    assert_eq!(body["latest"]["filename"], "fusion-summary-openai-2025-11-09.md");
    assert_eq!(
        body["latest"]["url"],
        "/api/dashboard/fusion/file/fusion-summary-openai-2025-11-09.md"
    );
    assert!(body["latest"]["modifiedAt"].is_string());
}

#[tokio::test]
async fn test_snapshot_served_from_cache_while_fresh() {
    let (_dir, layout) = test_root();
    let state = test_state(&layout);
    let cache = state.cache.clone();
    let app = build_router(state);

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(test_request("GET", "/api/dashboard/revenue"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(cache.refresh_count(Domain::Revenue), 1);
}

// =============================================================================
// Sources and manual refresh
// =============================================================================

#[tokio::test]
async fn test_sources_reports_degraded_when_files_missing() {
    let (_dir, layout) = test_root();
    let app = setup_app(&layout);

    let response = app
        .oneshot(test_request("GET", "/api/dashboard/sources"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;

    assert_eq!(body["ok"], false);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["sources"]["memoIndex"], false);
    assert_eq!(body["sources"]["fusionReports"], true);
}

#[tokio::test]
async fn test_sources_healthy_when_all_present() {
    let (_dir, layout) = test_root();
    std::fs::write(layout.memo_index_path(), "{}").unwrap();
    std::fs::write(layout.revenue_snapshot_path(), "{}").unwrap();
    let app = setup_app(&layout);

    let response = app
        .oneshot(test_request("GET", "/api/dashboard/sources"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;

    assert_eq!(body["ok"], true);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_manual_refresh_refreshes_every_domain() {
    let (_dir, layout) = test_root();
    let state = test_state(&layout);
    let cache = state.cache.clone();
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/dashboard/refresh"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["trigger"], "manual");
    assert_eq!(body["refreshed"], json!(["status", "revenue", "fusion"]));
    assert!(body["updatedAt"].is_string());

    for domain in Domain::ALL {
        assert_eq!(cache.refresh_count(domain), 1);
    }

    // A read right after the refresh is a cache hit
    let response = app
        .oneshot(test_request("GET", "/api/dashboard/fusion"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["source"], "manual");
    assert_eq!(cache.refresh_count(Domain::Fusion), 1);
}

#[tokio::test]
async fn test_refresh_requires_post() {
    let (_dir, layout) = test_root();
    let app = setup_app(&layout);

    let response = app
        .oneshot(test_request("GET", "/api/dashboard/refresh"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// =============================================================================
// Report files
// =============================================================================

#[tokio::test]
async fn test_report_file_served() {
    let (_dir, layout) = test_root();
    write_report(&layout, "fusion-summary-openai-2025-11-09.md", "# Unified Fusion Summary\n");
    let app = setup_app(&layout);

    let response = app
        .oneshot(test_request(
            "GET",
            "/api/dashboard/fusion/file/fusion-summary-openai-2025-11-09.md",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        extract_text(response.into_body()).await,
        "# Unified Fusion Summary\n"
    );
}

#[tokio::test]
async fn test_report_file_missing_is_404() {
    let (_dir, layout) = test_root();
    let app = setup_app(&layout);

    let response = app
        .oneshot(test_request("GET", "/api/dashboard/fusion/file/absent.md"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
