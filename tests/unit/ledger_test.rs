//! Tests for the progress ledger and its stores

use std::sync::Arc;
use std::time::{Duration, Instant};

use render_lanes::core::{
    LedgerEntry, LedgerStatus, LedgerStore, LedgerTransition, ProgressLedger, SchedulerError,
};
use render_lanes::infra::{InMemoryLedgerStore, ManifestLedgerStore};
use serde_json::{json, Value};

fn read_json(path: &std::path::Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_watermark_merges_with_max() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let ledger = ProgressLedger::new(store.clone());
    for scene in [3, 9, 4, 7] {
        ledger.update("story", LedgerTransition::Advance(scene)).await;
    }
    let entry = ledger.entry("story").await.unwrap();
    assert_eq!(entry.watermark, 9);
    assert_eq!(entry.status, LedgerStatus::InProgress);
    assert_eq!(store.save_count(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_advances_keep_maximum() {
    let ledger = Arc::new(ProgressLedger::new(Arc::new(InMemoryLedgerStore::new())));
    let tasks: Vec<_> = (0..8u32)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                for i in 0..25 {
                    ledger.update("story", LedgerTransition::Advance(t * 25 + i)).await;
                }
            })
        })
        .collect();
    for t in tasks {
        t.await.unwrap();
    }
    assert_eq!(ledger.entry("story").await.unwrap().watermark, 199);
}

#[tokio::test]
async fn test_complete_sets_exact_watermark() {
    let ledger = ProgressLedger::new(Arc::new(InMemoryLedgerStore::new()));
    ledger.update("story", LedgerTransition::Advance(12)).await;
    let entry = ledger.update("story", LedgerTransition::Complete { watermark: 10 }).await;
    assert_eq!(entry.status, LedgerStatus::Done);
    assert_eq!(entry.watermark, 10);
}

#[tokio::test]
async fn test_begin_keeps_pending_and_revives_done() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let mut pending = LedgerEntry::new("a");
    pending.last_update = Some("2024-01-01T00:00:00".into());
    store.insert(pending);
    let mut done = LedgerEntry::new("b");
    done.status = LedgerStatus::Done;
    done.watermark = 8;
    done.last_update = Some("2024-01-01T00:00:00".into());
    store.insert(done);

    let ledger = ProgressLedger::new(store);
    assert_eq!(ledger.update("a", LedgerTransition::Begin).await.status, LedgerStatus::Pending);
    let revived = ledger.update("b", LedgerTransition::Begin).await;
    assert_eq!(revived.status, LedgerStatus::InProgress);
    assert_eq!(revived.watermark, 8);
    assert_eq!(ledger.update("new", LedgerTransition::Begin).await.status, LedgerStatus::InProgress);
}

#[tokio::test]
async fn test_manifest_preserves_other_stage_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manifesto.json");
    std::fs::write(
        &path,
        serde_json::to_string(&json!({
            "story": { "txt": "ready", "suggestions": "done", "images": "pending", "scenes": 12 },
            "other": { "images": "done", "images_saved": 4 }
        }))
        .unwrap(),
    )
    .unwrap();

    let ledger = ProgressLedger::new(Arc::new(ManifestLedgerStore::new(&path)));
    ledger.update("story", LedgerTransition::Advance(5)).await;

    let manifest = read_json(&path);
    assert_eq!(manifest["story"]["txt"], "ready");
    assert_eq!(manifest["story"]["suggestions"], "done");
    assert_eq!(manifest["story"]["scenes"], 12);
    assert_eq!(manifest["story"]["images"], "in_progress");
    assert_eq!(manifest["story"]["images_saved"], 5);
    assert!(manifest["story"]["last_update"].is_string());
    assert_eq!(manifest["other"]["images"], "done");
    assert!(!dir.path().join("manifesto.json.tmp").exists());
}

#[test]
fn test_manifest_load_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("manifest.json");
    let store = ManifestLedgerStore::new(&path);
    assert_eq!(store.load_entry("story").unwrap(), None);

    let mut entry = LedgerEntry::new("story");
    entry.status = LedgerStatus::Done;
    entry.watermark = 42;
    entry.last_update = Some("2024-05-01T10:00:00".into());
    store.save_entry(&entry).unwrap();

    assert_eq!(store.load_entry("story").unwrap(), Some(entry));
}

#[test]
fn test_manifest_entry_without_image_stage_has_no_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manifest.json");
    std::fs::write(
        &path,
        r#"{ "story": { "suggestions": "done", "images_saved": "3", "last_update": "2024-01-01T00:00:00" } }"#,
    )
    .unwrap();
    let entry = ManifestLedgerStore::new(&path).load_entry("story").unwrap().unwrap();
    assert_eq!(entry.status, LedgerStatus::Pending);
    assert_eq!(entry.watermark, 3);
    assert_eq!(entry.last_update, None);
}

#[tokio::test]
async fn test_corrupt_manifest_is_an_error_but_ledger_continues() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manifest.json");
    std::fs::write(&path, "[1, 2").unwrap();
    let store = Arc::new(ManifestLedgerStore::new(&path));
    assert!(store.load_entry("story").is_err());

    let ledger = ProgressLedger::new(store);
    let entry = ledger.update("story", LedgerTransition::Advance(2)).await;
    assert_eq!(entry.watermark, 2);
    assert_eq!(ledger.entry("story").await.unwrap().watermark, 2);
}

#[test]
fn test_pending_bases_from_manifest_and_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manifest.json");
    std::fs::write(
        &path,
        serde_json::to_string(&json!({
            "alpha": { "suggestions": "done", "images": "in_progress" },
            "beta": { "suggestions": "done", "images": "done" },
            "gamma": { "suggestions": "pending" },
            "delta": { "suggestions": "done" }
        }))
        .unwrap(),
    )
    .unwrap();
    let store = ManifestLedgerStore::new(&path);
    let catalog = vec!["alpha".to_string(), "beta".to_string(), "zeta".to_string()];

    let pending = store.pending_bases(&catalog).unwrap();
    assert_eq!(pending, vec!["alpha", "delta", "zeta"]);
}

/// Ledger store whose writes block the calling thread.
struct SlowManifest {
    inner: InMemoryLedgerStore,
    delay: Duration,
}

impl LedgerStore for SlowManifest {
    fn load_entry(&self, base: &str) -> Result<Option<LedgerEntry>, SchedulerError> {
        self.inner.load_entry(base)
    }

    fn save_entry(&self, entry: &LedgerEntry) -> Result<(), SchedulerError> {
        std::thread::sleep(self.delay);
        self.inner.save_entry(entry)
    }
}

#[tokio::test]
async fn test_slow_store_does_not_stall_the_runtime() {
    let ledger = Arc::new(ProgressLedger::new(Arc::new(SlowManifest {
        inner: InMemoryLedgerStore::new(),
        delay: Duration::from_millis(300),
    })));
    let update = tokio::spawn({
        let ledger = Arc::clone(&ledger);
        async move { ledger.update("story", LedgerTransition::Advance(6)).await }
    });

    let started = Instant::now();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(started.elapsed() < Duration::from_millis(250));
    assert!(!update.is_finished());

    assert_eq!(update.await.unwrap().watermark, 6);
    assert_eq!(ledger.entry("story").await.unwrap().watermark, 6);
}
