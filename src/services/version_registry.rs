//! Version registry: versions live under exactly one project and own the
//! artifacts uploaded to them.

use crate::{
    models::version::{NewVersion, Version, VersionStatus},
    services::store::{ArtifactStore, StoreError, StoreResult, WriteTxn},
};
use chrono::Utc;
use tracing::{debug, info};

const VERSION_COLUMNS: &str =
    "id, project_id, codesys_version, status, notes, created_by, created_at";

pub struct VersionRegistry<'a> {
    store: &'a ArtifactStore,
}

impl<'a> VersionRegistry<'a> {
    pub(crate) fn new(store: &'a ArtifactStore) -> Self {
        Self { store }
    }

    /// Create a version under `project_id` with the default status.
    ///
    /// The project is looked up inside the same transaction as the insert, so
    /// a concurrently committed project delete always wins.
    pub async fn create(&self, project_id: i64, input: NewVersion) -> StoreResult<Version> {
        let mut txn = self.store.begin_write().await?;
        let result = Self::insert(&mut txn, project_id, input).await;
        let version = txn.finish(result).await?;

        info!(
            project_id,
            version_id = version.id,
            codesys_version = version.codesys_version.as_deref().unwrap_or("-"),
            "version created"
        );
        Ok(version)
    }

    async fn insert(
        txn: &mut WriteTxn<'_>,
        project_id: i64,
        input: NewVersion,
    ) -> StoreResult<Version> {
        let project: Option<i64> = sqlx::query_scalar("SELECT id FROM projects WHERE id = ?")
            .bind(project_id)
            .fetch_optional(txn.conn())
            .await?;
        if project.is_none() {
            return Err(StoreError::ProjectNotFound(project_id));
        }

        let version = sqlx::query_as::<_, Version>(&format!(
            "INSERT INTO versions (project_id, codesys_version, status, notes, created_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {VERSION_COLUMNS}"
        ))
        .bind(project_id)
        .bind(&input.codesys_version)
        .bind(VersionStatus::default())
        .bind(&input.notes)
        .bind(&input.created_by)
        .bind(Utc::now())
        .fetch_one(txn.conn())
        .await?;
        Ok(version)
    }

    /// Versions of a project, most recently created first. An unknown
    /// project yields an empty list.
    pub async fn list(&self, project_id: i64) -> StoreResult<Vec<Version>> {
        let versions = sqlx::query_as::<_, Version>(&format!(
            "SELECT {VERSION_COLUMNS} FROM versions
             WHERE project_id = ?
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(project_id)
        .fetch_all(&*self.store.db)
        .await?;
        Ok(versions)
    }

    pub async fn get(&self, version_id: i64) -> StoreResult<Version> {
        sqlx::query_as::<_, Version>(&format!(
            "SELECT {VERSION_COLUMNS} FROM versions WHERE id = ?"
        ))
        .bind(version_id)
        .fetch_optional(&*self.store.db)
        .await?
        .ok_or(StoreError::VersionNotFound(version_id))
    }

    /// Delete a version of `project_id` and every artifact attached to it.
    pub async fn delete(&self, project_id: i64, version_id: i64) -> StoreResult<()> {
        let mut txn = self.store.begin_write().await?;
        let result = self.delete_checked(&mut txn, project_id, version_id).await;
        let artifacts = txn.finish(result).await?;

        info!(project_id, version_id, artifacts, "version deleted");
        Ok(())
    }

    async fn delete_checked(
        &self,
        txn: &mut WriteTxn<'_>,
        project_id: i64,
        version_id: i64,
    ) -> StoreResult<u64> {
        let owned: Option<i64> =
            sqlx::query_scalar("SELECT id FROM versions WHERE id = ? AND project_id = ?")
                .bind(version_id)
                .bind(project_id)
                .fetch_optional(txn.conn())
                .await?;
        if owned.is_none() {
            return Err(StoreError::VersionNotInProject {
                project_id,
                version_id,
            });
        }
        self.delete_in(txn, version_id).await
    }

    /// Remove one version row after cascading into its artifacts. Returns the
    /// number of artifacts removed.
    async fn delete_in(&self, txn: &mut WriteTxn<'_>, version_id: i64) -> StoreResult<u64> {
        let artifacts = self.store.artifacts().delete_all_in(txn, version_id).await?;
        sqlx::query("DELETE FROM versions WHERE id = ?")
            .bind(version_id)
            .execute(txn.conn())
            .await?;
        debug!(version_id, artifacts, "version removed");
        Ok(artifacts)
    }

    /// Cascade step of a project delete: remove every version of the project.
    /// Returns the number of versions removed.
    pub(crate) async fn delete_all_in(
        &self,
        txn: &mut WriteTxn<'_>,
        project_id: i64,
    ) -> StoreResult<u64> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM versions WHERE project_id = ?")
            .bind(project_id)
            .fetch_all(txn.conn())
            .await?;

        for version_id in &ids {
            self.delete_in(txn, *version_id).await?;
        }
        Ok(ids.len() as u64)
    }
}
