//! Shared fixtures for emma-dash integration tests

#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use emma_common::config::RootLayout;
use emma_dash::{build_router, AppState};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Root folder with data/ and data/fusion_reports/ created
pub fn test_root() -> (TempDir, RootLayout) {
    let dir = TempDir::new().unwrap();
    let layout = RootLayout::new(dir.path().join("root"));
    layout.ensure_directories().unwrap();
    (dir, layout)
}

pub fn test_state(layout: &RootLayout) -> AppState {
    AppState::with_default_sources(layout.clone(), Duration::from_secs(600), ".md")
}

pub fn setup_app(layout: &RootLayout) -> axum::Router {
    build_router(test_state(layout))
}

pub fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

pub async fn extract_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).expect("Should be UTF-8")
}

pub fn write_report(layout: &RootLayout, name: &str, content: &str) {
    std::fs::write(layout.fusion_reports_dir().join(name), content).unwrap();
}

/// Set a file's modification time to `secs` after the epoch
pub fn set_mtime(path: &Path, secs: u64) {
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(std::time::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}
