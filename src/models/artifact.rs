//! Represents an uploaded file attached to a version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

/// The three artifact categories a version can carry.
///
/// Canonical wire values are `project`, `projectarchive` and `xml`; the
/// descriptive spellings are accepted on input as aliases.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Primary CODESYS project file.
    #[serde(alias = "primary-project-file")]
    Project,
    /// Packed project archive.
    #[serde(alias = "project-archive")]
    ProjectArchive,
    /// PLCopen XML export.
    #[serde(alias = "xml-export")]
    Xml,
}

impl ArtifactKind {
    /// Every kind, in listing order.
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Project,
        ArtifactKind::ProjectArchive,
        ArtifactKind::Xml,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Project => "project",
            ArtifactKind::ProjectArchive => "projectarchive",
            ArtifactKind::Xml => "xml",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names none of the three kinds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown artifact kind `{0}` (expected project, projectarchive or xml)")]
pub struct UnknownKind(pub String);

impl FromStr for ArtifactKind {
    type Err = UnknownKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "project" | "primary-project-file" => Ok(ArtifactKind::Project),
            "projectarchive" | "project-archive" => Ok(ArtifactKind::ProjectArchive),
            "xml" | "xml-export" => Ok(ArtifactKind::Xml),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// An artifact row. The payload is addressed by `content_hash`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct Artifact {
    #[serde(rename = "artifact_id")]
    pub id: i64,

    pub version_id: i64,

    pub kind: ArtifactKind,

    /// Original filename as supplied by the uploader.
    pub filename: String,

    /// Payload length in bytes.
    pub size_bytes: i64,

    /// Lowercase hex SHA-256 of the payload.
    pub content_hash: String,

    pub uploaded_by: Option<String>,

    pub uploaded_at: DateTime<Utc>,
}

/// Descriptive fields of an upload; the payload travels separately.
#[derive(Clone, Debug)]
pub struct NewArtifact {
    pub kind: ArtifactKind,
    pub filename: String,
    /// Free text. Blank or absent values are stored as a placeholder.
    pub uploaded_by: Option<String>,
}

/// Result of an upload: the artifact as stored plus whether it replaced a
/// previous artifact of the same kind.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct UploadOutcome {
    pub artifact: Artifact,
    pub replaced: bool,
}
