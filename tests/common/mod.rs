//! Shared helpers for the integration tests: a throw-away store on disk and
//! the full HTTP router built on top of it.

#![allow(dead_code)]

use artifact_store::{
    config::AppConfig,
    db,
    models::{
        artifact::{ArtifactKind, NewArtifact},
        project::{NewProject, Project},
        version::{NewVersion, Version},
    },
    services::store::ArtifactStore,
};
use axum::{Router, body::Body, http::Response};
use http_body_util::BodyExt;
use std::{path::Path, sync::Arc};
use tempfile::TempDir;

/// A store whose database and payloads live in a temporary directory that is
/// removed when the returned `TempDir` is dropped.
pub async fn test_store() -> (TempDir, ArtifactStore) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let url = format!("sqlite://{}", dir.path().join("meta/store.db").display());
    let pool = db::connect(&url, 5).await.expect("connect sqlite");
    db::run_migrations(&pool).await.expect("run migrations");
    let store = ArtifactStore::new(Arc::new(pool), dir.path().join("blobs"));
    (dir, store)
}

pub fn test_config(dir: &Path) -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        storage_dir: dir.join("blobs").display().to_string(),
        database_url: format!("sqlite://{}", dir.join("meta/store.db").display()),
        api_prefix: "/api".to_string(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        max_upload_bytes: 1024 * 1024,
    }
}

/// Build the application router exactly as `main` does.
pub async fn test_app() -> (TempDir, ArtifactStore, Router) {
    let (dir, store) = test_store().await;
    let app = artifact_store::app(store.clone(), &test_config(dir.path()));
    (dir, store, app)
}

pub async fn project(store: &ArtifactStore, name: &str, code: &str) -> Project {
    store
        .projects()
        .create(NewProject {
            name: name.to_string(),
            code: code.to_string(),
            owner: None,
        })
        .await
        .expect("create project")
}

pub async fn version(store: &ArtifactStore, project_id: i64, label: &str) -> Version {
    store
        .versions()
        .create(
            project_id,
            NewVersion {
                codesys_version: Some(label.to_string()),
                ..NewVersion::default()
            },
        )
        .await
        .expect("create version")
}

pub fn upload(kind: ArtifactKind, filename: &str) -> NewArtifact {
    NewArtifact {
        kind,
        filename: filename.to_string(),
        uploaded_by: Some("tester".to_string()),
    }
}

pub async fn count_rows(store: &ArtifactStore, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(&*store.db)
        .await
        .expect("count rows")
}

pub async fn ref_count(store: &ArtifactStore, hash: &str) -> Option<i64> {
    store
        .content
        .stat(&*store.db, hash)
        .await
        .expect("stat blob")
        .map(|blob| blob.ref_count)
}

/// Make every later statement matching `event` (for example
/// `BEFORE DELETE ON versions`) abort.
pub async fn fail_on(store: &ArtifactStore, trigger: &str, event: &str) {
    sqlx::query(&format!(
        "CREATE TRIGGER {trigger} {event} BEGIN SELECT RAISE(ABORT, 'injected failure'); END"
    ))
    .execute(&*store.db)
    .await
    .expect("create trigger");
}

/// Number of regular files below `root`, recursively.
pub fn count_files(root: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(root) else {
        return 0;
    };
    entries
        .map(|entry| entry.expect("dir entry").path())
        .map(|path| {
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("valid JSON body")
}

pub const BOUNDARY: &str = "artifact-store-test-boundary";

/// Encode a multipart/form-data body with text fields and an optional file
/// part named `f`.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"f\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
