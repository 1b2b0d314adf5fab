//! Read-side aggregation for the client: how complete each version's set of
//! artifacts is. Everything here is derived from the registries.

use crate::{
    models::artifact::ArtifactKind,
    services::store::{ArtifactStore, StoreResult},
};
use serde::Serialize;
use std::collections::BTreeSet;

/// Which of the three kinds a version currently carries.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct VersionSummary {
    pub version_id: i64,
    /// Number of distinct kinds attached (0 to 3).
    pub attached: usize,
    /// Number of kinds a complete version carries.
    pub expected: usize,
    pub kinds: Vec<ArtifactKind>,
    pub missing: Vec<ArtifactKind>,
}

impl VersionSummary {
    fn from_kinds(version_id: i64, kinds: BTreeSet<ArtifactKind>) -> Self {
        let missing = ArtifactKind::ALL
            .into_iter()
            .filter(|kind| !kinds.contains(kind))
            .collect();
        Self {
            version_id,
            attached: kinds.len(),
            expected: ArtifactKind::ALL.len(),
            kinds: kinds.into_iter().collect(),
            missing,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.attached == self.expected
    }
}

pub struct Listing<'a> {
    store: &'a ArtifactStore,
}

impl<'a> Listing<'a> {
    pub(crate) fn new(store: &'a ArtifactStore) -> Self {
        Self { store }
    }

    /// Count the distinct kinds in a version's artifact listing.
    pub async fn version_summary(&self, version_id: i64) -> StoreResult<VersionSummary> {
        let kinds = self
            .store
            .artifacts()
            .list(version_id)
            .await?
            .into_iter()
            .map(|artifact| artifact.kind)
            .collect();
        Ok(VersionSummary::from_kinds(version_id, kinds))
    }

    /// Summaries for every version of a project, most recent version first,
    /// computed from a single join.
    pub async fn project_summary(&self, project_id: i64) -> StoreResult<Vec<VersionSummary>> {
        let rows: Vec<(i64, Option<ArtifactKind>)> = sqlx::query_as(
            "SELECT v.id, a.kind
             FROM versions v
             LEFT JOIN artifacts a ON a.version_id = v.id
             WHERE v.project_id = ?
             ORDER BY v.created_at DESC, v.id DESC, a.kind ASC",
        )
        .bind(project_id)
        .fetch_all(&*self.store.db)
        .await?;

        let mut summaries: Vec<(i64, BTreeSet<ArtifactKind>)> = Vec::new();
        for (version_id, kind) in rows {
            match summaries.last_mut() {
                Some((current, kinds)) if *current == version_id => kinds.extend(kind),
                _ => summaries.push((version_id, kind.into_iter().collect())),
            }
        }

        Ok(summaries
            .into_iter()
            .map(|(version_id, kinds)| VersionSummary::from_kinds(version_id, kinds))
            .collect())
    }
}
