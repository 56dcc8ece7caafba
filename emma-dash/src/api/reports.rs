//! Fusion report file serving
//!
//! Only files directly inside the reports directory are served. Names are
//! resolved through [`emma_common::ArtifactStore::resolve`], which rejects
//! separators, `..` and symlinks pointing elsewhere.

use axum::{
    body::Body,
    extract::{Path, Request, State},
    response::Response,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/dashboard/fusion/file/:name
pub async fn get_report_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    let path = state.store.resolve(&name).await.map_err(|e| match e {
        emma_common::Error::InvalidInput(msg) => {
            warn!(requested = %name, "Rejected report path: {}", msg);
            ApiError::Forbidden(msg)
        }
        emma_common::Error::NotFound(_) => ApiError::NotFound(format!("Report {}", name)),
        other => ApiError::Common(other),
    })?;

    let response = ServeFile::new(path)
        .oneshot(request)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(response.map(Body::new))
}
