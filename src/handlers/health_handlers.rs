//! Health & readiness handlers.
//!
//! - GET /healthz  -> liveness, no I/O
//! - GET /readyz   -> metadata database and payload directory both usable

use crate::services::store::ArtifactStore;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { ok: true }))
}

/// `GET /readyz`
///
/// Runs `SELECT 1` against SQLite and a write/read/delete round trip in the
/// payload directory. HTTP 200 when both pass, 503 otherwise.
pub async fn readyz(State(store): State<ArtifactStore>) -> impl IntoResponse {
    let mut checks = BTreeMap::new();
    checks.insert("sqlite", check_sqlite(&store).await);
    checks.insert("payloads", check_payload_dir(&store).await);

    let ok = checks.values().all(|check| check.ok);
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ReadyResponse { ok, checks }))
}

async fn check_sqlite(store: &ArtifactStore) -> CheckStatus {
    match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*store.db)
        .await
    {
        Ok(1) => CheckStatus::pass(),
        Ok(v) => CheckStatus::fail(format!("unexpected result: {}", v)),
        Err(e) => CheckStatus::fail(format!("error: {}", e)),
    }
}

async fn check_payload_dir(store: &ArtifactStore) -> CheckStatus {
    const PROBE: &[u8] = b"readyz";
    let probe_path = store
        .content
        .base_path()
        .join(format!(".readyz-{}", Uuid::new_v4()));

    if let Err(e) = fs::create_dir_all(store.content.base_path()).await {
        return CheckStatus::fail(format!("could not create payload dir: {}", e));
    }
    if let Err(e) = fs::write(&probe_path, PROBE).await {
        return CheckStatus::fail(format!("could not write probe file: {}", e));
    }
    let read_back = fs::read(&probe_path).await;
    // best-effort cleanup; a leftover probe is harmless
    let _ = fs::remove_file(&probe_path).await;

    match read_back {
        Ok(bytes) if bytes == PROBE => CheckStatus::pass(),
        Ok(_) => CheckStatus::fail("probe file content mismatch".to_string()),
        Err(e) => CheckStatus::fail(format!("could not read probe file: {}", e)),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
}

#[derive(Serialize)]
struct ReadyResponse {
    ok: bool,
    checks: BTreeMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl CheckStatus {
    fn pass() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn fail(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
        }
    }
}
