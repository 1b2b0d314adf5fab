//! HTTP handlers for versions and the per-version listing facade.

use crate::{
    errors::AppError,
    models::version::{NewVersion, Version},
    services::{listing::VersionSummary, store::ArtifactStore},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

/// `GET /projects/{project_id}/versions` - newest first, empty for unknown
/// projects.
pub async fn list_versions(
    State(store): State<ArtifactStore>,
    Path(project_id): Path<i64>,
) -> Result<Json<Vec<Version>>, AppError> {
    Ok(Json(store.versions().list(project_id).await?))
}

/// `POST /projects/{project_id}/versions`
pub async fn create_version(
    State(store): State<ArtifactStore>,
    Path(project_id): Path<i64>,
    Json(body): Json<NewVersion>,
) -> Result<impl IntoResponse, AppError> {
    let version = store.versions().create(project_id, body).await?;
    Ok((StatusCode::CREATED, Json(version)))
}

/// `DELETE /projects/{project_id}/versions/{version_id}` - cascades to the
/// version's artifacts.
pub async fn delete_version(
    State(store): State<ArtifactStore>,
    Path((project_id, version_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    store.versions().delete(project_id, version_id).await?;
    Ok(Json(json!({ "deleted": true })))
}

/// `GET /versions/{version_id}/summary`
pub async fn version_summary(
    State(store): State<ArtifactStore>,
    Path(version_id): Path<i64>,
) -> Result<Json<VersionSummary>, AppError> {
    Ok(Json(store.listing().version_summary(version_id).await?))
}

/// `GET /projects/{project_id}/summary` - one summary per version.
pub async fn project_summary(
    State(store): State<ArtifactStore>,
    Path(project_id): Path<i64>,
) -> Result<Json<Vec<VersionSummary>>, AppError> {
    Ok(Json(store.listing().project_summary(project_id).await?))
}
