//! Represents a version of a project, the container artifacts attach to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle label of a version.
///
/// Every version is created as `Latest`; no operation moves it elsewhere.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum VersionStatus {
    #[default]
    Latest,
    Archived,
}

/// A version row. Always subordinate to exactly one project.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct Version {
    pub id: i64,

    /// Owning project. Immutable after creation.
    pub project_id: i64,

    /// Optional CODESYS release label (e.g. "3.5.1").
    pub codesys_version: Option<String>,

    pub status: VersionStatus,

    pub notes: Option<String>,

    pub created_by: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Input for creating a version under a project.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct NewVersion {
    #[serde(default)]
    pub codesys_version: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}
