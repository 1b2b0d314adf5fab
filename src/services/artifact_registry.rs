//! Artifact registry: at most one artifact per `(version, kind)`, each
//! pointing at a content-store payload.

use crate::{
    models::artifact::{Artifact, NewArtifact, UploadOutcome},
    services::store::{ArtifactStore, StoreError, StoreResult, WriteTxn, optional_text},
};
use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info};

/// Stored as `uploaded_by` when the uploader leaves it blank.
pub const DEFAULT_UPLOADER: &str = "user";

const ARTIFACT_COLUMNS: &str =
    "id, version_id, kind, filename, size_bytes, content_hash, uploaded_by, uploaded_at";

pub struct ArtifactRegistry<'a> {
    store: &'a ArtifactStore,
}

impl<'a> ArtifactRegistry<'a> {
    pub(crate) fn new(store: &'a ArtifactStore) -> Self {
        Self { store }
    }

    /// Upload `bytes` as the `input.kind` artifact of `version_id`.
    ///
    /// An existing artifact of the same kind is replaced in place (its id is
    /// kept) and its previous payload reference released. Payload write,
    /// row upsert and release share one transaction.
    pub async fn upload(
        &self,
        version_id: i64,
        input: NewArtifact,
        bytes: &[u8],
    ) -> StoreResult<UploadOutcome> {
        let mut txn = self.store.begin_write().await?;
        let result = self.upsert(&mut txn, version_id, input, bytes).await;
        let outcome = txn.finish(result).await?;

        info!(
            version_id,
            artifact_id = outcome.artifact.id,
            kind = %outcome.artifact.kind,
            hash = %outcome.artifact.content_hash,
            size = outcome.artifact.size_bytes,
            replaced = outcome.replaced,
            "artifact uploaded"
        );
        Ok(outcome)
    }

    async fn upsert(
        &self,
        txn: &mut WriteTxn<'_>,
        version_id: i64,
        input: NewArtifact,
        bytes: &[u8],
    ) -> StoreResult<UploadOutcome> {
        let version: Option<i64> = sqlx::query_scalar("SELECT id FROM versions WHERE id = ?")
            .bind(version_id)
            .fetch_optional(txn.conn())
            .await?;
        if version.is_none() {
            return Err(StoreError::VersionNotFound(version_id));
        }

        let hash = self.store.content.put(txn, bytes).await?;

        let previous: Option<String> = sqlx::query_scalar(
            "SELECT content_hash FROM artifacts WHERE version_id = ? AND kind = ?",
        )
        .bind(version_id)
        .bind(input.kind)
        .fetch_optional(txn.conn())
        .await?;

        let uploaded_by =
            optional_text(input.uploaded_by).unwrap_or_else(|| DEFAULT_UPLOADER.to_string());

        let artifact = sqlx::query_as::<_, Artifact>(&format!(
            r#"
            INSERT INTO artifacts (
                version_id, kind, filename, size_bytes, content_hash, uploaded_by, uploaded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(version_id, kind) DO UPDATE SET
                filename = excluded.filename,
                size_bytes = excluded.size_bytes,
                content_hash = excluded.content_hash,
                uploaded_by = excluded.uploaded_by,
                uploaded_at = excluded.uploaded_at
            RETURNING {ARTIFACT_COLUMNS}
            "#
        ))
        .bind(version_id)
        .bind(input.kind)
        .bind(&input.filename)
        .bind(bytes.len() as i64)
        .bind(&hash)
        .bind(&uploaded_by)
        .bind(Utc::now())
        .fetch_one(txn.conn())
        .await?;

        if let Some(old_hash) = &previous {
            self.store.content.release(txn, old_hash).await?;
        }

        Ok(UploadOutcome {
            artifact,
            replaced: previous.is_some(),
        })
    }

    /// Artifacts of a version ordered by kind. An unknown version yields an
    /// empty list.
    pub async fn list(&self, version_id: i64) -> StoreResult<Vec<Artifact>> {
        let artifacts = sqlx::query_as::<_, Artifact>(&format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts
             WHERE version_id = ?
             ORDER BY kind ASC, id ASC"
        ))
        .bind(version_id)
        .fetch_all(&*self.store.db)
        .await?;
        Ok(artifacts)
    }

    pub async fn get(&self, version_id: i64, artifact_id: i64) -> StoreResult<Artifact> {
        sqlx::query_as::<_, Artifact>(&format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE id = ? AND version_id = ?"
        ))
        .bind(artifact_id)
        .bind(version_id)
        .fetch_optional(&*self.store.db)
        .await?
        .ok_or(StoreError::ArtifactNotFound {
            version_id,
            artifact_id,
        })
    }

    /// Resolve an artifact and read its payload.
    ///
    /// The row lookup and the file open happen under the shared side of the
    /// writer lock, so the reader sees the state before or after any
    /// concurrent replace. The bytes are read after the lock is released
    /// through the already open handle.
    pub async fn get_content(
        &self,
        version_id: i64,
        artifact_id: i64,
    ) -> StoreResult<(Artifact, Bytes)> {
        let (artifact, file) = {
            let _shared = self.store.read_lock().await;
            let artifact = self.get(version_id, artifact_id).await?;
            let file = self
                .store
                .content
                .open(&*self.store.db, &artifact.content_hash)
                .await?;
            (artifact, file)
        };

        let bytes = self.store.content.read(&artifact.content_hash, file).await?;
        debug!(version_id, artifact_id, size = bytes.len(), "artifact content read");
        Ok((artifact, bytes))
    }

    /// Delete one artifact and release its payload reference.
    pub async fn delete(&self, version_id: i64, artifact_id: i64) -> StoreResult<()> {
        let mut txn = self.store.begin_write().await?;
        let result = self.delete_one(&mut txn, version_id, artifact_id).await;
        txn.finish(result).await?;

        info!(version_id, artifact_id, "artifact deleted");
        Ok(())
    }

    async fn delete_one(
        &self,
        txn: &mut WriteTxn<'_>,
        version_id: i64,
        artifact_id: i64,
    ) -> StoreResult<()> {
        let hash: Option<String> = sqlx::query_scalar(
            "DELETE FROM artifacts WHERE id = ? AND version_id = ? RETURNING content_hash",
        )
        .bind(artifact_id)
        .bind(version_id)
        .fetch_optional(txn.conn())
        .await?;

        let hash = hash.ok_or(StoreError::ArtifactNotFound {
            version_id,
            artifact_id,
        })?;
        self.store.content.release(txn, &hash).await
    }

    /// Cascade step of a version delete: remove every artifact of
    /// `version_id`, releasing each payload reference. Returns the number of
    /// artifacts removed.
    pub(crate) async fn delete_all_in(
        &self,
        txn: &mut WriteTxn<'_>,
        version_id: i64,
    ) -> StoreResult<u64> {
        let hashes: Vec<String> =
            sqlx::query_scalar("DELETE FROM artifacts WHERE version_id = ? RETURNING content_hash")
                .bind(version_id)
                .fetch_all(txn.conn())
                .await?;

        for hash in &hashes {
            self.store.content.release(txn, hash).await?;
        }
        Ok(hashes.len() as u64)
    }
}
