//! Content-addressed payload storage.
//!
//! Payloads are stored once per distinct SHA-256 digest and sharded beneath
//! `base_path/{hash[0..2]}/{hash[2..4]}/{hash}`. The `blobs` table carries a
//! reference count per digest. Counting happens inside the caller's
//! transaction; file removal happens only after the outcome is committed.

use crate::{
    models::blob::Blob,
    services::store::{StoreError, StoreResult, WriteTxn},
};
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::{StreamExt, pin_mut};
use sha2::{Digest, Sha256};
use sqlx::{SqliteExecutor, SqlitePool};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use uuid::Uuid;

const HASH_HEX_LEN: usize = 64;
const TMP_PREFIX: &str = ".tmp-";

#[derive(Clone, Debug)]
pub struct ContentStore {
    base_path: PathBuf,
}

impl ContentStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Root directory of the payload tree.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Lowercase hex SHA-256 of `bytes`.
    pub fn digest(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    /// Construct the payload path for a digest.
    ///
    /// Callers must have checked the digest with [`is_valid_hash`] first.
    fn blob_path(&self, hash: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        path.push(&hash[0..2]);
        path.push(&hash[2..4]);
        path.push(hash);
        path
    }

    /// Take one reference on `bytes`, writing the payload file as needed.
    ///
    /// The first reference always rewrites the file, so a stray file left at
    /// the same path is never adopted. Later references keep the existing
    /// file only if it still hashes to its address. The write is fsynced and
    /// renamed into place before the transaction commits.
    pub(crate) async fn put(&self, txn: &mut WriteTxn<'_>, bytes: &[u8]) -> StoreResult<String> {
        let hash = Self::digest(bytes);

        let ref_count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO blobs (hash, size_bytes, ref_count, created_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT(hash) DO UPDATE SET ref_count = ref_count + 1
            RETURNING ref_count
            "#,
        )
        .bind(&hash)
        .bind(bytes.len() as i64)
        .bind(Utc::now())
        .fetch_one(txn.conn())
        .await?;

        if self.write_payload(&hash, bytes, ref_count == 1).await? {
            txn.created.push(hash.clone());
        }

        debug!(%hash, ref_count, size = bytes.len(), "content referenced");
        Ok(hash)
    }

    /// Bookkeeping row for `hash`, if any artifact references it.
    pub async fn stat<'c, E>(&self, exec: E, hash: &str) -> StoreResult<Option<Blob>>
    where
        E: SqliteExecutor<'c>,
    {
        let blob = sqlx::query_as::<_, Blob>(
            "SELECT hash, size_bytes, ref_count, created_at FROM blobs WHERE hash = ?",
        )
        .bind(hash)
        .fetch_optional(exec)
        .await?;
        Ok(blob)
    }

    /// Open the payload for `hash`.
    ///
    /// Fails with `BlobNotFound` if no live reference exists or the file is
    /// gone. An open handle stays readable after the file is unlinked.
    pub(crate) async fn open<'c, E>(&self, exec: E, hash: &str) -> StoreResult<File>
    where
        E: SqliteExecutor<'c>,
    {
        if !is_valid_hash(hash) {
            return Err(StoreError::BlobNotFound(hash.to_string()));
        }
        match self.stat(exec, hash).await? {
            Some(blob) if blob.ref_count > 0 => {}
            _ => return Err(StoreError::BlobNotFound(hash.to_string())),
        }

        File::open(self.blob_path(hash)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::BlobNotFound(hash.to_string())
            } else {
                StoreError::Io(err)
            }
        })
    }

    /// Read an opened payload, failing with `Corrupt` if the bytes no
    /// longer match their address.
    pub(crate) async fn read(&self, hash: &str, file: File) -> StoreResult<Bytes> {
        let (bytes, actual) = read_hashed(file).await?;
        if actual != hash {
            return Err(StoreError::Corrupt {
                hash: hash.to_string(),
                actual,
            });
        }
        Ok(bytes)
    }

    /// Drop one reference on `hash`.
    ///
    /// When the count reaches zero the blob row is deleted and the hash is
    /// queued on `txn` so the payload file is removed after commit.
    pub(crate) async fn release(&self, txn: &mut WriteTxn<'_>, hash: &str) -> StoreResult<()> {
        let remaining: Option<i64> = sqlx::query_scalar(
            "UPDATE blobs SET ref_count = ref_count - 1
             WHERE hash = ? AND ref_count > 0
             RETURNING ref_count",
        )
        .bind(hash)
        .fetch_optional(txn.conn())
        .await?;

        match remaining {
            None => Err(StoreError::BlobNotFound(hash.to_string())),
            Some(0) => {
                sqlx::query("DELETE FROM blobs WHERE hash = ?")
                    .bind(hash)
                    .execute(txn.conn())
                    .await?;
                debug!(%hash, "content unreferenced, queued for reclaim");
                txn.reclaimed.push(hash.to_string());
                Ok(())
            }
            Some(ref_count) => {
                debug!(%hash, ref_count, "content released");
                Ok(())
            }
        }
    }

    /// Write the payload file for `hash`.
    ///
    /// With `overwrite` unset an existing file is kept when its bytes still
    /// hash to `hash`. Returns true when a file was written. Writes go to a
    /// temporary file that is fsynced and then renamed into place.
    async fn write_payload(&self, hash: &str, bytes: &[u8], overwrite: bool) -> StoreResult<bool> {
        let file_path = self.blob_path(hash);
        if !overwrite && self.payload_intact(&file_path, hash).await? {
            return Ok(false);
        }

        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::other("payload path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!("{TMP_PREFIX}{}", Uuid::new_v4()));

        if let Err(err) = write_synced(&tmp_path, bytes).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        debug!(%hash, path = %file_path.display(), "payload written");
        Ok(true)
    }

    async fn payload_intact(&self, file_path: &Path, hash: &str) -> StoreResult<bool> {
        let file = match File::open(file_path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(StoreError::Io(err)),
        };
        let (_, actual) = read_hashed(file).await?;
        if actual != hash {
            warn!(%hash, %actual, "existing payload does not match its address, rewriting");
            return Ok(false);
        }
        Ok(true)
    }

    /// Remove payload files for those `hashes` that have no blob row.
    ///
    /// Runs after a command's outcome is known. Failures are logged and left
    /// for the next orphan sweep.
    pub(crate) async fn discard_unreferenced(&self, db: &SqlitePool, hashes: &[String]) {
        for hash in hashes {
            let live: Result<i64, sqlx::Error> =
                sqlx::query_scalar("SELECT COUNT(*) FROM blobs WHERE hash = ?")
                    .bind(hash)
                    .fetch_one(db)
                    .await;
            match live {
                Ok(0) => self.remove_payload(hash).await,
                Ok(_) => {}
                Err(err) => warn!(%hash, error = %err, "could not check blob before reclaim"),
            }
        }
    }

    /// Delete a payload file and prune the shard directories it leaves empty.
    async fn remove_payload(&self, hash: &str) {
        let file_path = self.blob_path(hash);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed payload {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("payload {} already missing", file_path.display());
            }
            Err(err) => {
                warn!("failed to remove payload {}: {}", file_path.display(), err);
                return;
            }
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &self.base_path).await;
        }
    }

    /// Walk the shard tree and delete files no blob row accounts for,
    /// including temporary files from interrupted writes.
    pub(crate) async fn sweep_orphans(&self, db: &SqlitePool) -> StoreResult<usize> {
        let mut removed = 0;
        for outer in list_dirs(&self.base_path).await? {
            for inner in list_dirs(&outer).await? {
                let mut entries = fs::read_dir(&inner).await?;
                while let Some(entry) = entries.next_entry().await? {
                    if !entry.file_type().await?.is_file() {
                        continue;
                    }
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let orphaned = if name.starts_with(TMP_PREFIX) {
                        true
                    } else if is_valid_hash(&name) {
                        let live: i64 =
                            sqlx::query_scalar("SELECT COUNT(*) FROM blobs WHERE hash = ?")
                                .bind(&name)
                                .fetch_one(db)
                                .await?;
                        live == 0
                    } else {
                        false
                    };

                    if orphaned {
                        fs::remove_file(entry.path()).await?;
                        debug!("swept orphaned payload {}", entry.path().display());
                        removed += 1;
                    }
                }
                self.prune_empty_dirs(&inner, &self.base_path).await;
            }
        }
        Ok(removed)
    }

    /// Remove `start` and its ancestors while they are empty, never touching
    /// `stop` itself. Any error ends the walk quietly.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(()) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) => {
                    if !matches!(err.kind(), ErrorKind::NotFound | ErrorKind::DirectoryNotEmpty) {
                        debug!(dir = %current.display(), error = %err, "shard directory kept");
                    }
                    break;
                }
            }
        }
    }
}

/// True if `hash` looks like a lowercase hex SHA-256 digest.
pub fn is_valid_hash(hash: &str) -> bool {
    hash.len() == HASH_HEX_LEN && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Read a whole file, returning its bytes and their SHA-256 in one pass.
async fn read_hashed(file: File) -> io::Result<(Bytes, String)> {
    let mut hasher = Sha256::new();
    let mut buf = BytesMut::new();
    let stream = ReaderStream::new(file);
    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        hasher.update(&chunk);
        buf.extend_from_slice(&chunk);
    }
    Ok((buf.freeze(), format!("{:x}", hasher.finalize())))
}

async fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}

async fn list_dirs(path: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    let mut entries = match fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(dirs),
        Err(err) => return Err(err),
    };
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}
