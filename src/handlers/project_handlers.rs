//! HTTP handlers for the project registry.

use crate::{
    errors::AppError,
    models::project::{NewProject, Project, ProjectUpdate},
    services::store::ArtifactStore,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

/// `GET /projects` - newest first.
pub async fn list_projects(
    State(store): State<ArtifactStore>,
) -> Result<Json<Vec<Project>>, AppError> {
    Ok(Json(store.projects().list().await?))
}

/// `POST /projects`
pub async fn create_project(
    State(store): State<ArtifactStore>,
    Json(body): Json<NewProject>,
) -> Result<impl IntoResponse, AppError> {
    let project = store.projects().create(body).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// `PUT /projects/{project_id}` - partial update.
pub async fn update_project(
    State(store): State<ArtifactStore>,
    Path(project_id): Path<i64>,
    Json(body): Json<ProjectUpdate>,
) -> Result<Json<Project>, AppError> {
    Ok(Json(store.projects().update(project_id, body).await?))
}

/// `DELETE /projects/{project_id}` - cascades to versions and artifacts.
pub async fn delete_project(
    State(store): State<ArtifactStore>,
    Path(project_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    store.projects().delete(project_id).await?;
    Ok(Json(json!({ "deleted": true })))
}
