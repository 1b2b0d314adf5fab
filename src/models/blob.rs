//! Bookkeeping row for a content-addressed payload.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A deduplicated payload in the content store.
///
/// The bytes themselves live on disk; this row tracks how many artifacts
/// point at them. Rows are deleted as soon as `ref_count` reaches zero.
#[derive(Serialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct Blob {
    /// Lowercase hex SHA-256 of the payload.
    pub hash: String,

    pub size_bytes: i64,

    /// Number of artifacts currently referencing this payload.
    pub ref_count: i64,

    pub created_at: DateTime<Utc>,
}
