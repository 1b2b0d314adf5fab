//! Defines routes for the project, version and artifact resources.
//!
//! ## Structure
//! - **Health** (always at the root)
//!   - `GET    /healthz`, `GET /readyz`
//!
//! - **Projects** (under the API prefix)
//!   - `GET    /projects` - list
//!   - `POST   /projects` - create
//!   - `PUT    /projects/{project_id}` - partial update
//!   - `DELETE /projects/{project_id}` - delete with cascade
//!   - `GET    /projects/{project_id}/summary` - attached kinds per version
//!
//! - **Versions**
//!   - `GET    /projects/{project_id}/versions` - list, newest first
//!   - `POST   /projects/{project_id}/versions` - create
//!   - `DELETE /projects/{project_id}/versions/{version_id}` - delete with cascade
//!   - `GET    /versions/{version_id}/summary` - attached kinds
//!
//! - **Artifacts**
//!   - `GET    /versions/{version_id}/artifacts` - list
//!   - `POST   /versions/{version_id}/artifacts` - multipart upload (replaces same kind)
//!   - `DELETE /versions/{version_id}/artifacts/{artifact_id}` - delete
//!   - `GET    /versions/{version_id}/artifacts/{artifact_id}/download` - raw bytes

use crate::{
    handlers::{
        artifact_handlers::{delete_artifact, download_artifact, list_artifacts, upload_artifact},
        health_handlers::{healthz, readyz},
        project_handlers::{create_project, delete_project, list_projects, update_project},
        version_handlers::{
            create_version, delete_version, list_versions, project_summary, version_summary,
        },
    },
    services::store::ArtifactStore,
};
use axum::{
    Router,
    routing::{delete, get, put},
};

/// Build the router for all resources, nesting the API below `api_prefix`
/// (empty means the root).
///
/// The router carries shared state (`ArtifactStore`) to all handlers.
pub fn routes(api_prefix: &str) -> Router<ArtifactStore> {
    let api = Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{project_id}",
            put(update_project).delete(delete_project),
        )
        .route("/projects/{project_id}/summary", get(project_summary))
        .route(
            "/projects/{project_id}/versions",
            get(list_versions).post(create_version),
        )
        .route(
            "/projects/{project_id}/versions/{version_id}",
            delete(delete_version),
        )
        .route("/versions/{version_id}/summary", get(version_summary))
        .route(
            "/versions/{version_id}/artifacts",
            get(list_artifacts).post(upload_artifact),
        )
        .route(
            "/versions/{version_id}/artifacts/{artifact_id}",
            delete(delete_artifact),
        )
        .route(
            "/versions/{version_id}/artifacts/{artifact_id}/download",
            get(download_artifact),
        );

    let router = Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz));

    if api_prefix.is_empty() {
        router.merge(api)
    } else {
        router.nest(api_prefix, api)
    }
}
