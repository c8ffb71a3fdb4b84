//! Tests for artifact stores and the store-backed oracle

use std::sync::Arc;

use render_lanes::core::{ArtifactStore, CompletionOracle, StoreOracle};
use render_lanes::infra::{FsArtifactStore, InMemoryArtifactStore};
use render_lanes::util::serde::ArtifactPayload;

fn payloads(n: u8) -> Vec<ArtifactPayload> {
    (0..n).map(|i| ArtifactPayload::new(vec![i])).collect()
}

#[test]
fn test_fs_store_keeps_every_second_payload() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsArtifactStore::new(dir.path(), 2);

    let saved = store.save("story", 3, &payloads(4)).unwrap();
    assert_eq!(saved, 2);
    assert_eq!(std::fs::read(dir.path().join("story/_01/003.jpg")).unwrap(), vec![0]);
    assert_eq!(std::fs::read(dir.path().join("story/_02/003.jpg")).unwrap(), vec![2]);
    assert!(store.exists("story", 3));
    assert!(!store.exists("story", 4));
}

#[test]
fn test_fs_store_partial_variants_are_incomplete() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsArtifactStore::new(dir.path(), 3);

    assert_eq!(store.save("story", 1, &payloads(2)).unwrap(), 1);
    assert!(!store.exists("story", 1));

    let oracle = StoreOracle::new(Arc::new(store.clone()));
    assert_eq!(oracle.pending("story", &[1]), vec![1]);
    store.save("story", 1, &payloads(6)).unwrap();
    assert!(oracle.is_complete("story", 1));
}

#[test]
fn test_fs_store_custom_stride() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsArtifactStore::new(dir.path(), 2).with_stride(1);
    assert_eq!(store.save("story", 9, &payloads(2)).unwrap(), 2);
    assert_eq!(std::fs::read(dir.path().join("story/_02/009.jpg")).unwrap(), vec![1]);
}

#[test]
fn test_fs_store_sees_artifacts_written_elsewhere() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsArtifactStore::new(dir.path(), 1);
    let oracle = StoreOracle::new(Arc::new(store.clone()));
    assert!(!oracle.is_complete("story", 12));

    let target = dir.path().join("story/_01");
    std::fs::create_dir_all(&target).unwrap();
    std::fs::write(target.join("012.jpg"), b"jpg").unwrap();
    assert!(oracle.is_complete("story", 12));
    assert_eq!(oracle.highest_complete("story", &[1, 12, 30]), Some(12));
}

#[test]
fn test_in_memory_store_ignores_empty_payloads() {
    let store = InMemoryArtifactStore::new();
    assert_eq!(store.save("story", 1, &[ArtifactPayload::new(Vec::new())]).unwrap(), 0);
    assert!(!store.exists("story", 1));
    assert_eq!(store.save("story", 1, &payloads(1)).unwrap(), 1);
    assert!(store.exists("story", 1));
    assert_eq!(store.save_count("story", 1), 1);
}
