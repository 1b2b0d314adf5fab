//! HTTP handlers for artifacts attached to a version.
//! Uploads arrive as multipart forms; downloads return the raw payload with
//! the original filename in `Content-Disposition`.

use crate::{
    errors::AppError,
    models::artifact::{Artifact, ArtifactKind, NewArtifact},
    services::store::{ArtifactStore, StoreError},
};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Multipart, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

/// Body returned by an upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub artifact_id: i64,
    pub replaced: bool,
    pub kind: ArtifactKind,
    pub content_hash: String,
    pub size_bytes: i64,
}

/// `GET /versions/{version_id}/artifacts` - ordered by kind, empty for
/// unknown versions.
pub async fn list_artifacts(
    State(store): State<ArtifactStore>,
    Path(version_id): Path<i64>,
) -> Result<Json<Vec<Artifact>>, AppError> {
    Ok(Json(store.artifacts().list(version_id).await?))
}

/// `POST /versions/{version_id}/artifacts` - multipart form with fields
/// `kind`, optional `uploaded_by`, and the file itself under `f`.
///
/// Replaces an existing artifact of the same kind.
pub async fn upload_artifact(
    State(store): State<ArtifactStore>,
    Path(version_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut kind: Option<ArtifactKind> = None;
    let mut uploaded_by: Option<String> = None;
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "kind" => {
                let raw = field.text().await?;
                kind = Some(raw.parse::<ArtifactKind>().map_err(StoreError::from)?);
            }
            "uploaded_by" => uploaded_by = Some(field.text().await?),
            "f" | "file" => {
                let filename = field
                    .file_name()
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or("unnamed")
                    .to_string();
                file = Some((filename, field.bytes().await?));
            }
            other => tracing::debug!(field = other, "ignoring unknown multipart field"),
        }
    }

    let kind = kind.ok_or_else(|| AppError::bad_request("missing `kind` field"))?;
    let (filename, bytes) = file.ok_or_else(|| AppError::bad_request("missing file field `f`"))?;

    let outcome = store
        .artifacts()
        .upload(
            version_id,
            NewArtifact {
                kind,
                filename,
                uploaded_by,
            },
            &bytes,
        )
        .await?;

    Ok(Json(UploadResponse {
        artifact_id: outcome.artifact.id,
        replaced: outcome.replaced,
        kind: outcome.artifact.kind,
        content_hash: outcome.artifact.content_hash,
        size_bytes: outcome.artifact.size_bytes,
    }))
}

/// `GET /versions/{version_id}/artifacts/{artifact_id}/download`
pub async fn download_artifact(
    State(store): State<ArtifactStore>,
    Path((version_id, artifact_id)): Path<(i64, i64)>,
) -> Result<Response, AppError> {
    let (artifact, bytes) = store
        .artifacts()
        .get_content(version_id, artifact_id)
        .await?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;
    set_download_headers(response.headers_mut(), &artifact);
    Ok(response)
}

/// `DELETE /versions/{version_id}/artifacts/{artifact_id}`
pub async fn delete_artifact(
    State(store): State<ArtifactStore>,
    Path((version_id, artifact_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    store.artifacts().delete(version_id, artifact_id).await?;
    Ok(Json(json!({ "deleted": true })))
}

fn set_download_headers(headers: &mut HeaderMap, artifact: &Artifact) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&artifact.size_bytes.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );

    if let Ok(value) = HeaderValue::from_str(&content_disposition(&artifact.filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    let quoted = format!("\"{}\"", artifact.content_hash);
    if let Ok(value) = HeaderValue::from_str(&quoted) {
        headers.insert(header::ETAG, value);
    }

    if let Ok(value) = HeaderValue::from_str(&artifact.uploaded_at.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}

/// `attachment` disposition with an ASCII fallback name plus the RFC 5987
/// `filename*` form so non-ASCII names survive.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    if fallback == filename {
        format!("attachment; filename=\"{}\"", fallback)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            percent_encode(filename)
        )
    }
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-' | b'_' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}
