//! Project registry: creation, update, listing and cascading deletion of
//! projects. Project codes are unique (exact, case-sensitive match).

use crate::{
    models::project::{NewProject, Project, ProjectUpdate},
    services::store::{
        ArtifactStore, StoreError, StoreResult, WriteTxn, is_unique_violation, optional_text,
        required_text,
    },
};
use chrono::Utc;
use tracing::info;

const PROJECT_COLUMNS: &str = "id, name, code, owner, created_at";

pub struct ProjectRegistry<'a> {
    store: &'a ArtifactStore,
}

impl<'a> ProjectRegistry<'a> {
    pub(crate) fn new(store: &'a ArtifactStore) -> Self {
        Self { store }
    }

    /// Create a project.
    ///
    /// Name and code are trimmed and must be non-empty. Fails with
    /// `CodeConflict` if another project already uses the code.
    pub async fn create(&self, input: NewProject) -> StoreResult<Project> {
        let name = required_text("name", &input.name)?;
        let code = required_text("code", &input.code)?;
        let owner = optional_text(input.owner);

        let mut txn = self.store.begin_write().await?;
        let result = Self::insert(&mut txn, name, code, owner).await;
        let project = txn.finish(result).await?;

        info!(project_id = project.id, code = %project.code, "project created");
        Ok(project)
    }

    async fn insert(
        txn: &mut WriteTxn<'_>,
        name: String,
        code: String,
        owner: Option<String>,
    ) -> StoreResult<Project> {
        Self::ensure_code_free(txn, &code, None).await?;

        sqlx::query_as::<_, Project>(&format!(
            "INSERT INTO projects (name, code, owner, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(&name)
        .bind(&code)
        .bind(&owner)
        .bind(Utc::now())
        .fetch_one(txn.conn())
        .await
        .map_err(|err| conflict_or(err, &code))
    }

    /// Apply a partial update. Only fields present in `changes` are touched.
    ///
    /// A changed code is checked against every other project. A blank owner
    /// clears the owner.
    pub async fn update(&self, project_id: i64, changes: ProjectUpdate) -> StoreResult<Project> {
        let name = changes
            .name
            .as_deref()
            .map(|name| required_text("name", name))
            .transpose()?;
        let code = changes
            .code
            .as_deref()
            .map(|code| required_text("code", code))
            .transpose()?;

        let mut txn = self.store.begin_write().await?;
        let result = Self::apply_update(&mut txn, project_id, name, code, changes.owner).await;
        let project = txn.finish(result).await?;

        info!(project_id, code = %project.code, "project updated");
        Ok(project)
    }

    async fn apply_update(
        txn: &mut WriteTxn<'_>,
        project_id: i64,
        name: Option<String>,
        code: Option<String>,
        owner: Option<String>,
    ) -> StoreResult<Project> {
        let current = sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"
        ))
        .bind(project_id)
        .fetch_optional(txn.conn())
        .await?
        .ok_or(StoreError::ProjectNotFound(project_id))?;

        let name = name.unwrap_or(current.name);
        let code = match code {
            Some(code) if code != current.code => {
                Self::ensure_code_free(txn, &code, Some(project_id)).await?;
                code
            }
            _ => current.code,
        };
        let owner = match owner {
            Some(owner) => optional_text(Some(owner)),
            None => current.owner,
        };

        sqlx::query_as::<_, Project>(&format!(
            "UPDATE projects SET name = ?, code = ?, owner = ?
             WHERE id = ?
             RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(&name)
        .bind(&code)
        .bind(&owner)
        .bind(project_id)
        .fetch_one(txn.conn())
        .await
        .map_err(|err| conflict_or(err, &code))
    }

    /// Delete a project together with all of its versions and artifacts.
    pub async fn delete(&self, project_id: i64) -> StoreResult<()> {
        let mut txn = self.store.begin_write().await?;
        let result = Self::delete_in(self.store, &mut txn, project_id).await;
        let versions = txn.finish(result).await?;

        info!(project_id, versions, "project deleted");
        Ok(())
    }

    async fn delete_in(
        store: &ArtifactStore,
        txn: &mut WriteTxn<'_>,
        project_id: i64,
    ) -> StoreResult<u64> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM projects WHERE id = ?")
            .bind(project_id)
            .fetch_optional(txn.conn())
            .await?;
        if exists.is_none() {
            return Err(StoreError::ProjectNotFound(project_id));
        }

        let versions = store.versions().delete_all_in(txn, project_id).await?;

        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(project_id)
            .execute(txn.conn())
            .await?;
        Ok(versions)
    }

    /// All projects, most recently created first.
    pub async fn list(&self) -> StoreResult<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&*self.store.db)
        .await?;
        Ok(projects)
    }

    pub async fn get(&self, project_id: i64) -> StoreResult<Project> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"
        ))
        .bind(project_id)
        .fetch_optional(&*self.store.db)
        .await?
        .ok_or(StoreError::ProjectNotFound(project_id))
    }

    async fn ensure_code_free(
        txn: &mut WriteTxn<'_>,
        code: &str,
        except: Option<i64>,
    ) -> StoreResult<()> {
        let holder: Option<i64> =
            sqlx::query_scalar("SELECT id FROM projects WHERE code = ? AND id IS NOT ?")
                .bind(code)
                .bind(except)
                .fetch_optional(txn.conn())
                .await?;
        match holder {
            Some(_) => Err(StoreError::CodeConflict(code.to_string())),
            None => Ok(()),
        }
    }
}

fn conflict_or(err: sqlx::Error, code: &str) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::CodeConflict(code.to_string())
    } else {
        StoreError::Sqlx(err)
    }
}
