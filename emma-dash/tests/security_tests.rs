//! Security tests for emma-dash report file serving
//!
//! Requests whose resolved path leaves the fusion reports directory must be
//! refused with 403, whatever encoding they arrive in.

mod common;

use axum::http::StatusCode;
use common::{extract_json, setup_app, test_request, test_root};
use tower::util::ServiceExt;

async fn status_for(uri: &str) -> StatusCode {
    let (dir, layout) = test_root();
    // Sibling of the reports directory that must never be reachable
    std::fs::write(layout.data_dir().join("secret.txt"), "top secret").unwrap();
    std::fs::write(dir.path().join("outside.txt"), "outside").unwrap();
    let app = setup_app(&layout);

    app.oneshot(test_request("GET", uri)).await.unwrap().status()
}

#[tokio::test]
async fn test_encoded_parent_traversal_forbidden() {
    assert_eq!(
        status_for("/api/dashboard/fusion/file/..%2Fsecret.txt").await,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        status_for("/api/dashboard/fusion/file/..%2F..%2F..%2Foutside.txt").await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_dot_dot_name_forbidden() {
    assert_eq!(
        status_for("/api/dashboard/fusion/file/%2E%2E").await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_absolute_path_forbidden() {
    assert_eq!(
        status_for("/api/dashboard/fusion/file/%2Fetc%2Fpasswd").await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_backslash_traversal_forbidden() {
    assert_eq!(
        status_for("/api/dashboard/fusion/file/..%5Csecret.txt").await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_forbidden_body_is_json_error() {
    let (_dir, layout) = test_root();
    let app = setup_app(&layout);

    let response = app
        .oneshot(test_request("GET", "/api/dashboard/fusion/file/..%2Fmemo_index.json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_escaping_reports_dir_forbidden() {
    let (dir, layout) = test_root();
    let outside = dir.path().join("outside.txt");
    std::fs::write(&outside, "outside").unwrap();
    std::os::unix::fs::symlink(&outside, layout.fusion_reports_dir().join("link.md")).unwrap();
    let app = setup_app(&layout);

    let response = app
        .oneshot(test_request("GET", "/api/dashboard/fusion/file/link.md"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
