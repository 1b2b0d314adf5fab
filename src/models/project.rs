//! Represents a software project, the root of the ownership hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A project tracked by the store.
///
/// Projects own versions, which in turn own artifacts. Deleting a project
/// removes everything beneath it.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct Project {
    /// Server-assigned identifier.
    pub id: i64,

    /// Human readable name (non-empty).
    pub name: String,

    /// Short code, unique across all projects (case-sensitive).
    pub code: String,

    /// Optional owner label. Free text, no identity semantics.
    pub owner: Option<String>,

    /// When this project was created.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a project.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct NewProject {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub owner: Option<String>,
}

/// Partial update of a project; absent fields stay untouched.
///
/// An `owner` consisting only of whitespace clears the owner.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ProjectUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
}
