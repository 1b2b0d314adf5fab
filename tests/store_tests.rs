//! Behaviour of the storage layer: replace-on-upload, deduplication,
//! cascading deletes and the error taxonomy.

mod common;

use artifact_store::{
    models::{
        artifact::ArtifactKind,
        project::{NewProject, ProjectUpdate},
        version::{NewVersion, VersionStatus},
    },
    services::{
        artifact_registry::DEFAULT_UPLOADER,
        content_store::ContentStore,
        store::{ErrorKind, StoreError},
    },
};
use common::{count_files, count_rows, fail_on, project, ref_count, test_store, upload, version};

const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
const XYZ_SHA256: &str = "3608bca1e44ea6c4d268eb6db02260269892c0b42b86bbf1e77a6fa16c3c9282";

// ---------------------------------------------------------------------------
// End-to-end scenario
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_replace_and_cascade_scenario() {
    let (dir, store) = test_store().await;

    let line1 = project(&store, "Line1", "L1").await;
    let v1 = version(&store, line1.id, "3.5.1").await;
    assert_eq!(v1.codesys_version.as_deref(), Some("3.5.1"));

    let first = store
        .artifacts()
        .upload(v1.id, upload(ArtifactKind::Xml, "line1.xml"), b"abc")
        .await
        .unwrap();
    assert!(!first.replaced);
    assert_eq!(first.artifact.content_hash, ABC_SHA256);
    assert_eq!(first.artifact.size_bytes, 3);

    let second = store
        .artifacts()
        .upload(v1.id, upload(ArtifactKind::Xml, "line1.xml"), b"xyz")
        .await
        .unwrap();
    assert!(second.replaced);
    assert_eq!(second.artifact.id, first.artifact.id);
    assert_eq!(second.artifact.content_hash, XYZ_SHA256);

    let listed = store.artifacts().list(v1.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].content_hash, XYZ_SHA256);

    // "abc" is no longer referenced by anything
    assert_eq!(ref_count(&store, ABC_SHA256).await, None);
    assert_eq!(ref_count(&store, XYZ_SHA256).await, Some(1));

    store.versions().delete(line1.id, v1.id).await.unwrap();
    assert!(store.artifacts().list(v1.id).await.unwrap().is_empty());

    store.projects().delete(line1.id).await.unwrap();
    assert!(store.versions().list(line1.id).await.unwrap().is_empty());

    assert_eq!(count_rows(&store, "blobs").await, 0);
    assert_eq!(count_files(&dir.path().join("blobs")), 0);
}

// ---------------------------------------------------------------------------
// Replace-on-upload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeated_uploads_keep_one_artifact_with_last_content() {
    let (_dir, store) = test_store().await;
    let p = project(&store, "Press", "PR").await;
    let v = version(&store, p.id, "3.5.17").await;

    let bodies: [&[u8]; 4] = [b"one", b"two", b"three", b"four"];
    for body in bodies {
        store
            .artifacts()
            .upload(v.id, upload(ArtifactKind::Project, "press.project"), body)
            .await
            .unwrap();
    }

    let listed = store.artifacts().list(v.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    let (artifact, bytes) = store
        .artifacts()
        .get_content(v.id, listed[0].id)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"four");
    assert_eq!(artifact.size_bytes, 4);
    assert_eq!(count_rows(&store, "blobs").await, 1);
}

#[tokio::test]
async fn reuploading_identical_bytes_keeps_single_reference() {
    let (_dir, store) = test_store().await;
    let p = project(&store, "Press", "PR").await;
    let v = version(&store, p.id, "3.5.17").await;

    for _ in 0..2 {
        store
            .artifacts()
            .upload(v.id, upload(ArtifactKind::Xml, "press.xml"), b"same")
            .await
            .unwrap();
    }

    let hash = ContentStore::digest(b"same");
    assert_eq!(ref_count(&store, &hash).await, Some(1));
}

#[tokio::test]
async fn kinds_are_listed_in_stable_order() {
    let (_dir, store) = test_store().await;
    let p = project(&store, "Press", "PR").await;
    let v = version(&store, p.id, "3.5.17").await;

    for kind in [
        ArtifactKind::Xml,
        ArtifactKind::Project,
        ArtifactKind::ProjectArchive,
    ] {
        store
            .artifacts()
            .upload(v.id, upload(kind, "file"), kind.as_str().as_bytes())
            .await
            .unwrap();
    }

    let kinds: Vec<ArtifactKind> = store
        .artifacts()
        .list(v.id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.kind)
        .collect();
    assert_eq!(kinds, ArtifactKind::ALL.to_vec());
}

#[tokio::test]
async fn blank_uploader_gets_placeholder() {
    let (_dir, store) = test_store().await;
    let p = project(&store, "Press", "PR").await;
    let v = version(&store, p.id, "3.5.17").await;

    let mut input = upload(ArtifactKind::Xml, "press.xml");
    input.uploaded_by = Some("   ".to_string());
    let outcome = store.artifacts().upload(v.id, input, b"x").await.unwrap();
    assert_eq!(outcome.artifact.uploaded_by.as_deref(), Some(DEFAULT_UPLOADER));

    let mut input = upload(ArtifactKind::Project, "press.project");
    input.uploaded_by = None;
    let outcome = store.artifacts().upload(v.id, input, b"y").await.unwrap();
    assert_eq!(outcome.artifact.uploaded_by.as_deref(), Some(DEFAULT_UPLOADER));
}

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn identical_bytes_are_stored_once() {
    let (dir, store) = test_store().await;
    let p = project(&store, "Press", "PR").await;
    let v1 = version(&store, p.id, "3.5.16").await;
    let v2 = version(&store, p.id, "3.5.17").await;

    let a = store
        .artifacts()
        .upload(v1.id, upload(ArtifactKind::Xml, "a.xml"), b"shared")
        .await
        .unwrap();
    let b = store
        .artifacts()
        .upload(v2.id, upload(ArtifactKind::Xml, "b.xml"), b"shared")
        .await
        .unwrap();

    assert_ne!(a.artifact.id, b.artifact.id);
    assert_eq!(a.artifact.content_hash, b.artifact.content_hash);
    assert_eq!(ref_count(&store, &a.artifact.content_hash).await, Some(2));
    assert_eq!(count_rows(&store, "blobs").await, 1);
    assert_eq!(count_files(&dir.path().join("blobs")), 1);

    // one reference goes away, the other artifact still reads its bytes
    store.versions().delete(p.id, v1.id).await.unwrap();
    assert_eq!(ref_count(&store, &a.artifact.content_hash).await, Some(1));
    let (_, bytes) = store
        .artifacts()
        .get_content(v2.id, b.artifact.id)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"shared");
    assert_eq!(count_files(&dir.path().join("blobs")), 1);
}

#[tokio::test]
async fn same_bytes_under_two_kinds_share_a_blob() {
    let (_dir, store) = test_store().await;
    let p = project(&store, "Press", "PR").await;
    let v = version(&store, p.id, "3.5.17").await;

    let project_file = store
        .artifacts()
        .upload(v.id, upload(ArtifactKind::Project, "p"), b"payload")
        .await
        .unwrap();
    let archive = store
        .artifacts()
        .upload(v.id, upload(ArtifactKind::ProjectArchive, "a"), b"payload")
        .await
        .unwrap();

    assert_eq!(
        project_file.artifact.content_hash,
        archive.artifact.content_hash
    );
    assert_eq!(
        ref_count(&store, &archive.artifact.content_hash).await,
        Some(2)
    );

    store
        .artifacts()
        .delete(v.id, project_file.artifact.id)
        .await
        .unwrap();
    assert_eq!(
        ref_count(&store, &archive.artifact.content_hash).await,
        Some(1)
    );
}

// ---------------------------------------------------------------------------
// Cascades
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deleting_a_project_leaves_no_orphans() {
    let (dir, store) = test_store().await;
    let keep = project(&store, "Keep", "KEEP").await;
    let doomed = project(&store, "Doomed", "DOOM").await;

    let kept_version = version(&store, keep.id, "3.5.1").await;
    store
        .artifacts()
        .upload(kept_version.id, upload(ArtifactKind::Xml, "k.xml"), b"kept")
        .await
        .unwrap();

    for label in ["1.0", "2.0", "3.0"] {
        let v = version(&store, doomed.id, label).await;
        for kind in ArtifactKind::ALL {
            let body = format!("{label}-{kind}");
            store
                .artifacts()
                .upload(v.id, upload(kind, "f"), body.as_bytes())
                .await
                .unwrap();
        }
    }
    assert_eq!(count_rows(&store, "artifacts").await, 10);

    store.projects().delete(doomed.id).await.unwrap();

    assert_eq!(count_rows(&store, "projects").await, 1);
    assert_eq!(count_rows(&store, "versions").await, 1);
    assert_eq!(count_rows(&store, "artifacts").await, 1);
    assert_eq!(count_rows(&store, "blobs").await, 1);
    assert_eq!(count_files(&dir.path().join("blobs")), 1);
    assert!(store.versions().list(doomed.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn version_delete_requires_matching_project() {
    let (_dir, store) = test_store().await;
    let a = project(&store, "A", "A").await;
    let b = project(&store, "B", "B").await;
    let v = version(&store, a.id, "1.0").await;

    let err = store.versions().delete(b.id, v.id).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::VersionNotInProject { project_id, version_id }
            if project_id == b.id && version_id == v.id
    ));
    assert_eq!(store.versions().list(a.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn no_children_after_parent_delete() {
    let (_dir, store) = test_store().await;
    let p = project(&store, "Gone", "GONE").await;
    let v = version(&store, p.id, "1.0").await;
    store.projects().delete(p.id).await.unwrap();

    let err = store
        .versions()
        .create(p.id, NewVersion::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = store
        .artifacts()
        .upload(v.id, upload(ArtifactKind::Xml, "late.xml"), b"late")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::VersionNotFound(id) if id == v.id));
    assert_eq!(count_rows(&store, "blobs").await, 0);
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_code_is_a_conflict() {
    let (_dir, store) = test_store().await;
    project(&store, "Line1", "L1").await;

    let err = store
        .projects()
        .create(NewProject {
            name: "Another line".into(),
            code: "L1".into(),
            owner: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(store.projects().list().await.unwrap().len(), 1);

    // codes are case-sensitive
    project(&store, "Lowercase", "l1").await;
    assert_eq!(store.projects().list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn blank_name_or_code_is_rejected() {
    let (_dir, store) = test_store().await;
    for (name, code) in [("", "X"), ("Name", "   ")] {
        let err = store
            .projects()
            .create(NewProject {
                name: name.into(),
                code: code.into(),
                owner: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
    assert_eq!(count_rows(&store, "projects").await, 0);
}

#[tokio::test]
async fn update_rechecks_code_against_other_projects() {
    let (_dir, store) = test_store().await;
    let a = project(&store, "A", "A").await;
    project(&store, "B", "B").await;

    let err = store
        .projects()
        .update(
            a.id,
            ProjectUpdate {
                code: Some("B".into()),
                ..ProjectUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::CodeConflict(ref code) if code == "B"));

    // keeping its own code is not a conflict
    let updated = store
        .projects()
        .update(
            a.id,
            ProjectUpdate {
                name: Some("Renamed".into()),
                code: Some("A".into()),
                owner: Some("ops".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.code, "A");
    assert_eq!(updated.owner.as_deref(), Some("ops"));
    assert_eq!(updated.created_at, a.created_at);

    let cleared = store
        .projects()
        .update(
            a.id,
            ProjectUpdate {
                owner: Some(String::new()),
                ..ProjectUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.owner, None);
    assert_eq!(cleared.name, "Renamed");

    let err = store
        .projects()
        .update(9999, ProjectUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ProjectNotFound(9999)));
}

#[tokio::test]
async fn update_rejects_blank_name_or_code() {
    let (_dir, store) = test_store().await;
    let p = project(&store, "Line1", "L1").await;

    for changes in [
        ProjectUpdate {
            name: Some("  ".into()),
            ..ProjectUpdate::default()
        },
        ProjectUpdate {
            code: Some(String::new()),
            ..ProjectUpdate::default()
        },
    ] {
        let err = store.projects().update(p.id, changes).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    let unchanged = store.projects().get(p.id).await.unwrap();
    assert_eq!(unchanged.name, "Line1");
    assert_eq!(unchanged.code, "L1");
}

#[tokio::test]
async fn lists_are_newest_first() {
    let (_dir, store) = test_store().await;
    let first = project(&store, "First", "P1").await;
    let second = project(&store, "Second", "P2").await;

    let ids: Vec<i64> = store
        .projects()
        .list()
        .await
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let older = version(&store, first.id, "1.0").await;
    let newer = version(&store, first.id, "2.0").await;
    let versions = store.versions().list(first.id).await.unwrap();
    assert_eq!(
        versions.iter().map(|v| v.id).collect::<Vec<_>>(),
        vec![newer.id, older.id]
    );
    assert!(versions.iter().all(|v| v.status == VersionStatus::Latest));
}

#[tokio::test]
async fn lists_of_unknown_parents_are_empty() {
    let (_dir, store) = test_store().await;
    assert!(store.versions().list(42).await.unwrap().is_empty());
    assert!(store.artifacts().list(42).await.unwrap().is_empty());
    assert!(store.listing().project_summary(42).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn artifacts_are_scoped_to_their_version() {
    let (_dir, store) = test_store().await;
    let p = project(&store, "Press", "PR").await;
    let v1 = version(&store, p.id, "1.0").await;
    let v2 = version(&store, p.id, "2.0").await;

    let outcome = store
        .artifacts()
        .upload(v1.id, upload(ArtifactKind::Xml, "a.xml"), b"abc")
        .await
        .unwrap();

    let err = store
        .artifacts()
        .get_content(v2.id, outcome.artifact.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = store
        .artifacts()
        .delete(v2.id, outcome.artifact.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    store
        .artifacts()
        .delete(v1.id, outcome.artifact.id)
        .await
        .unwrap();
    let err = store
        .artifacts()
        .delete(v1.id, outcome.artifact.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ArtifactNotFound { .. }));
}

#[tokio::test]
async fn corrupted_payload_is_reported() {
    let (dir, store) = test_store().await;
    let p = project(&store, "Press", "PR").await;
    let v = version(&store, p.id, "1.0").await;
    let outcome = store
        .artifacts()
        .upload(v.id, upload(ArtifactKind::Xml, "a.xml"), b"abc")
        .await
        .unwrap();

    let payload = dir
        .path()
        .join("blobs")
        .join(&ABC_SHA256[0..2])
        .join(&ABC_SHA256[2..4])
        .join(ABC_SHA256);
    std::fs::write(&payload, b"tampered").unwrap();

    let err = store
        .artifacts()
        .get_content(v.id, outcome.artifact.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));
    assert_eq!(err.kind(), ErrorKind::StorageIo);
}

#[tokio::test]
async fn sweep_removes_only_unreferenced_payloads() {
    let (dir, store) = test_store().await;
    let p = project(&store, "Press", "PR").await;
    let v = version(&store, p.id, "1.0").await;
    store
        .artifacts()
        .upload(v.id, upload(ArtifactKind::Xml, "a.xml"), b"abc")
        .await
        .unwrap();

    let stray_dir = dir.path().join("blobs").join("36").join("08");
    std::fs::create_dir_all(&stray_dir).unwrap();
    std::fs::write(stray_dir.join(XYZ_SHA256), b"xyz").unwrap();
    std::fs::write(stray_dir.join(".tmp-interrupted"), b"partial").unwrap();
    assert_eq!(count_files(&dir.path().join("blobs")), 3);

    let removed = store.sweep_orphans().await.unwrap();

    assert_eq!(removed, 2);
    assert_eq!(count_files(&dir.path().join("blobs")), 1);
    assert!(!dir.path().join("blobs").join("36").exists());
    let (_, bytes) = store
        .artifacts()
        .get_content(v.id, store.artifacts().list(v.id).await.unwrap()[0].id)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"abc");
}

#[tokio::test]
async fn stray_file_at_payload_path_is_not_adopted() {
    let (dir, store) = test_store().await;
    let p = project(&store, "Press", "PR").await;
    let v = version(&store, p.id, "1.0").await;

    let shard = dir.path().join("blobs").join("ba").join("78");
    std::fs::create_dir_all(&shard).unwrap();
    std::fs::write(shard.join(ABC_SHA256), b"garbage").unwrap();

    let outcome = store
        .artifacts()
        .upload(v.id, upload(ArtifactKind::Xml, "a.xml"), b"abc")
        .await
        .unwrap();
    assert_eq!(outcome.artifact.content_hash, ABC_SHA256);

    let (_, bytes) = store
        .artifacts()
        .get_content(v.id, outcome.artifact.id)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"abc");
}

#[tokio::test]
async fn rotted_shared_payload_is_repaired_by_reupload() {
    let (dir, store) = test_store().await;
    let p = project(&store, "Press", "PR").await;
    let v = version(&store, p.id, "1.0").await;
    let xml = store
        .artifacts()
        .upload(v.id, upload(ArtifactKind::Xml, "a.xml"), b"abc")
        .await
        .unwrap();

    let payload = dir
        .path()
        .join("blobs")
        .join("ba")
        .join("78")
        .join(ABC_SHA256);
    std::fs::write(&payload, b"rotted").unwrap();

    store
        .artifacts()
        .upload(v.id, upload(ArtifactKind::Project, "a.project"), b"abc")
        .await
        .unwrap();
    assert_eq!(ref_count(&store, ABC_SHA256).await, Some(2));

    let (_, bytes) = store
        .artifacts()
        .get_content(v.id, xml.artifact.id)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"abc");
}

// ---------------------------------------------------------------------------
// Atomicity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_project_cascade_leaves_everything_in_place() {
    let (dir, store) = test_store().await;
    let p = project(&store, "Line1", "L1").await;
    let v = version(&store, p.id, "3.5.1").await;
    let outcome = store
        .artifacts()
        .upload(v.id, upload(ArtifactKind::Xml, "a.xml"), b"abc")
        .await
        .unwrap();

    fail_on(&store, "versions_locked", "BEFORE DELETE ON versions").await;

    let err = store.projects().delete(p.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageIo);

    assert_eq!(count_rows(&store, "projects").await, 1);
    assert_eq!(count_rows(&store, "versions").await, 1);
    assert_eq!(count_rows(&store, "artifacts").await, 1);
    assert_eq!(ref_count(&store, ABC_SHA256).await, Some(1));
    assert_eq!(count_files(&dir.path().join("blobs")), 1);

    let (_, bytes) = store
        .artifacts()
        .get_content(v.id, outcome.artifact.id)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"abc");
}

#[tokio::test]
async fn failed_upload_leaves_no_blob_or_file() {
    let (dir, store) = test_store().await;
    let p = project(&store, "Line1", "L1").await;
    let v = version(&store, p.id, "3.5.1").await;

    fail_on(&store, "artifacts_locked", "BEFORE INSERT ON artifacts").await;

    let err = store
        .artifacts()
        .upload(v.id, upload(ArtifactKind::Xml, "a.xml"), b"abc")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageIo);

    assert_eq!(count_rows(&store, "artifacts").await, 0);
    assert_eq!(count_rows(&store, "blobs").await, 0);
    assert_eq!(count_files(&dir.path().join("blobs")), 0);
}

// ---------------------------------------------------------------------------
// Listing facade
// ---------------------------------------------------------------------------

#[tokio::test]
async fn summaries_count_attached_kinds() {
    let (_dir, store) = test_store().await;
    let p = project(&store, "Press", "PR").await;
    let old = version(&store, p.id, "1.0").await;
    let new = version(&store, p.id, "2.0").await;

    for kind in ArtifactKind::ALL {
        store
            .artifacts()
            .upload(old.id, upload(kind, "f"), kind.as_str().as_bytes())
            .await
            .unwrap();
    }
    store
        .artifacts()
        .upload(new.id, upload(ArtifactKind::Xml, "f.xml"), b"xml")
        .await
        .unwrap();
    // replacing does not change the count
    store
        .artifacts()
        .upload(new.id, upload(ArtifactKind::Xml, "f.xml"), b"xml2")
        .await
        .unwrap();

    let summary = store.listing().version_summary(new.id).await.unwrap();
    assert_eq!(summary.attached, 1);
    assert_eq!(
        summary.missing,
        vec![ArtifactKind::Project, ArtifactKind::ProjectArchive]
    );

    let per_version = store.listing().project_summary(p.id).await.unwrap();
    assert_eq!(per_version.len(), 2);
    assert_eq!(per_version[0].version_id, new.id);
    assert_eq!(per_version[0].attached, 1);
    assert_eq!(per_version[1].version_id, old.id);
    assert!(per_version[1].is_complete());

    let empty = version(&store, p.id, "3.0").await;
    assert_eq!(
        store.listing().version_summary(empty.id).await.unwrap().attached,
        0
    );
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_uploads_to_one_kind_serialize() {
    let (_dir, store) = test_store().await;
    let p = project(&store, "Press", "PR").await;
    let v = version(&store, p.id, "1.0").await;

    let mut tasks = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        let version_id = v.id;
        tasks.push(tokio::spawn(async move {
            let body = format!("body-{i}");
            store
                .artifacts()
                .upload(
                    version_id,
                    upload(ArtifactKind::ProjectArchive, "a.zip"),
                    body.as_bytes(),
                )
                .await
        }));
    }

    let mut fresh_inserts = 0;
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        if !outcome.replaced {
            fresh_inserts += 1;
        }
    }
    assert_eq!(fresh_inserts, 1);

    let listed = store.artifacts().list(v.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(count_rows(&store, "blobs").await, 1);
    assert_eq!(ref_count(&store, &listed[0].content_hash).await, Some(1));

    let (_, bytes) = store
        .artifacts()
        .get_content(v.id, listed[0].id)
        .await
        .unwrap();
    assert_eq!(ContentStore::digest(&bytes), listed[0].content_hash);
}
