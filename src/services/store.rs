//! src/services/store.rs
//!
//! ArtifactStore: the shared state behind every registry. Metadata lives in
//! SQLite, payloads live on disk beneath the content store's base path.
//!
//! Every mutating command goes through [`ArtifactStore::begin_write`], which
//! serializes writers and opens one SQLite transaction. Registries thread the
//! resulting [`WriteTxn`] through their cascades so a command either commits
//! as a whole or leaves no trace.

use crate::{
    models::artifact::UnknownKind,
    services::{
        artifact_registry::ArtifactRegistry, content_store::ContentStore, listing::Listing,
        project_registry::ProjectRegistry, version_registry::VersionRegistry,
    },
};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::{io, path::PathBuf, sync::Arc};
use thiserror::Error;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("project `{0}` not found")]
    ProjectNotFound(i64),
    #[error("version `{0}` not found")]
    VersionNotFound(i64),
    #[error("version `{version_id}` not found in project `{project_id}`")]
    VersionNotInProject { project_id: i64, version_id: i64 },
    #[error("artifact `{artifact_id}` not found in version `{version_id}`")]
    ArtifactNotFound { version_id: i64, artifact_id: i64 },
    #[error("content `{0}` not found")]
    BlobNotFound(String),
    #[error("project code `{0}` already exists")]
    CodeConflict(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error(transparent)]
    UnknownKind(#[from] UnknownKind),
    #[error("content `{hash}` is corrupt (payload hashes to `{actual}`)")]
    Corrupt { hash: String, actual: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Coarse classification of [`StoreError`] that callers map onto their own
/// error surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidArgument,
    StorageIo,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::ProjectNotFound(_)
            | StoreError::VersionNotFound(_)
            | StoreError::VersionNotInProject { .. }
            | StoreError::ArtifactNotFound { .. }
            | StoreError::BlobNotFound(_) => ErrorKind::NotFound,
            StoreError::CodeConflict(_) => ErrorKind::Conflict,
            StoreError::InvalidArgument(_) | StoreError::UnknownKind(_) => {
                ErrorKind::InvalidArgument
            }
            StoreError::Corrupt { .. } | StoreError::Sqlx(_) | StoreError::Io(_) => {
                ErrorKind::StorageIo
            }
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle to the artifact store.
///
/// Cheap to clone; all clones share the pool, the payload directory and the
/// writer lock.
#[derive(Clone)]
pub struct ArtifactStore {
    /// Shared SQLite connection pool used for metadata.
    pub db: Arc<SqlitePool>,

    /// Content-addressed payload storage.
    pub content: ContentStore,

    /// Writers hold it exclusively from `begin_write` until payload
    /// reclaim is done. Readers hold it shared while resolving a payload.
    write_lock: Arc<RwLock<()>>,
}

impl ArtifactStore {
    /// Create a store backed by `db` that keeps payloads under `base_path`.
    ///
    /// The schema is expected to exist already (see `db::run_migrations`).
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            content: ContentStore::new(base_path),
            write_lock: Arc::new(RwLock::new(())),
        }
    }

    pub fn projects(&self) -> ProjectRegistry<'_> {
        ProjectRegistry::new(self)
    }

    pub fn versions(&self) -> VersionRegistry<'_> {
        VersionRegistry::new(self)
    }

    pub fn artifacts(&self) -> ArtifactRegistry<'_> {
        ArtifactRegistry::new(self)
    }

    pub fn listing(&self) -> Listing<'_> {
        Listing::new(self)
    }

    /// Acquire the writer lock and open a transaction.
    ///
    /// The lock is held until the returned [`WriteTxn`] is finished, so
    /// payload files and blob rows never change underneath a command.
    pub(crate) async fn begin_write(&self) -> StoreResult<WriteTxn<'_>> {
        let guard = self.write_lock.write().await;
        let tx = self.db.begin().await?;
        Ok(WriteTxn {
            _guard: guard,
            tx,
            db: &self.db,
            content: &self.content,
            created: Vec::new(),
            reclaimed: Vec::new(),
        })
    }

    /// Shared side of the writer lock. While held, no command can commit or
    /// reclaim a payload file.
    pub(crate) async fn read_lock(&self) -> RwLockReadGuard<'_, ()> {
        self.write_lock.read().await
    }

    /// Remove payload files that no blob row references.
    ///
    /// Such files are left behind when the process dies between writing a
    /// payload and committing the transaction that references it.
    pub async fn sweep_orphans(&self) -> StoreResult<usize> {
        let _guard = self.write_lock.write().await;
        let removed = self.content.sweep_orphans(&self.db).await?;
        if removed > 0 {
            info!(removed, "removed orphaned payload files");
        }
        Ok(removed)
    }
}

/// One mutating command in flight: the writer lock, the open transaction and
/// the payload bookkeeping that has to happen once the outcome is known.
pub struct WriteTxn<'a> {
    _guard: RwLockWriteGuard<'a, ()>,
    tx: Transaction<'static, Sqlite>,
    db: &'a SqlitePool,
    content: &'a ContentStore,
    /// Payload files written for the first time by this command.
    pub(crate) created: Vec<String>,
    /// Hashes whose reference count dropped to zero in this command.
    pub(crate) reclaimed: Vec<String>,
}

impl WriteTxn<'_> {
    pub(crate) fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Commit on `Ok`, roll back on `Err`, and return `result` unchanged
    /// unless the commit itself fails.
    pub(crate) async fn finish<T>(self, result: StoreResult<T>) -> StoreResult<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                debug!(error = %err, "rolling back command");
                self.rollback().await;
                Err(err)
            }
        }
    }

    async fn commit(self) -> StoreResult<()> {
        let WriteTxn {
            _guard,
            tx,
            db,
            content,
            created,
            reclaimed,
        } = self;

        if let Err(err) = tx.commit().await {
            content.discard_unreferenced(db, &created).await;
            return Err(err.into());
        }
        content.discard_unreferenced(db, &reclaimed).await;
        Ok(())
    }

    async fn rollback(self) {
        let WriteTxn {
            _guard,
            tx,
            db,
            content,
            created,
            ..
        } = self;

        if let Err(err) = tx.rollback().await {
            debug!(error = %err, "explicit rollback failed, connection will discard the transaction");
        }
        content.discard_unreferenced(db, &created).await;
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

/// Trim a required text field, rejecting blank values.
pub(crate) fn required_text(field: &str, value: &str) -> StoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidArgument(format!(
            "{field} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// Collapse blank optional text to `None`; keep anything else as supplied.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
