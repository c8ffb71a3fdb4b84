//! Durable progress ledger.
//!
//! The ledger is the only state written by many concurrent workers. Every mutation
//! goes through [`ProgressLedger::update`], which holds one async lock across
//! load → apply transition → stamp → save, so concurrent updates never interleave.
//! Store calls run on the blocking pool; a slow manifest parks only the tasks
//! waiting on the ledger, never a runtime thread.
//! Watermark advances are merged with `max`, which makes the result independent of
//! the order in which workers finish.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::core::SchedulerError;
use crate::util::clock::timestamp;
use crate::util::serde::SceneId;

/// Rendering status of a base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    /// Nothing rendered yet.
    #[default]
    Pending,
    /// Some scenes rendered, work remains.
    InProgress,
    /// Every scene confirmed complete.
    Done,
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Persisted progress for one base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Base identifier.
    pub base: String,
    /// Current status.
    pub status: LedgerStatus,
    /// Highest scene id known to be rendered.
    pub watermark: SceneId,
    /// Timestamp of the last transition.
    pub last_update: Option<String>,
}

impl LedgerEntry {
    /// Fresh pending entry.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            status: LedgerStatus::Pending,
            watermark: 0,
            last_update: None,
        }
    }
}

/// Named state transitions applied by [`ProgressLedger::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerTransition {
    /// Dispatch is starting. A missing or stale `done` entry becomes `in_progress`;
    /// `pending` and `in_progress` keep their status.
    Begin,
    /// A scene was rendered and confirmed. Watermark becomes `max(current, scene)`.
    Advance(SceneId),
    /// Every scene is confirmed. Status `done`, watermark set to the catalog maximum.
    Complete {
        /// Maximum scene id across all pools.
        watermark: SceneId,
    },
    /// The run ended with work remaining. Status `in_progress`, watermark merged
    /// with the highest confirmed scene.
    Suspend {
        /// Highest scene id confirmed complete.
        watermark: SceneId,
    },
}

impl LedgerTransition {
    /// Apply the transition to an entry in place (without stamping).
    pub fn apply(self, entry: &mut LedgerEntry) {
        match self {
            Self::Begin => {
                if entry.status == LedgerStatus::Done || entry.last_update.is_none() {
                    entry.status = LedgerStatus::InProgress;
                }
            }
            Self::Advance(scene) => {
                entry.status = LedgerStatus::InProgress;
                entry.watermark = entry.watermark.max(scene);
            }
            Self::Complete { watermark } => {
                entry.status = LedgerStatus::Done;
                entry.watermark = watermark;
            }
            Self::Suspend { watermark } => {
                entry.status = LedgerStatus::InProgress;
                entry.watermark = entry.watermark.max(watermark);
            }
        }
    }
}

/// Durable storage for ledger entries.
///
/// Single-process only: two schedulers must not share a base concurrently.
pub trait LedgerStore: Send + Sync + 'static {
    /// Load the entry for `base`, if one was ever written.
    fn load_entry(&self, base: &str) -> Result<Option<LedgerEntry>, SchedulerError>;

    /// Persist the full entry for `entry.base`.
    fn save_entry(&self, entry: &LedgerEntry) -> Result<(), SchedulerError>;
}

/// Serialized accessor over a [`LedgerStore`].
///
/// Keeps the last known entry per base in memory. If the store cannot be read the
/// cached entry is used; if it cannot be written the failure is logged and the
/// in-memory state is kept, so a broken manifest never aborts a run.
pub struct ProgressLedger {
    store: Arc<dyn LedgerStore>,
    cache: Mutex<HashMap<String, LedgerEntry>>,
}

impl ProgressLedger {
    /// Wrap a store.
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn on_store<T, F>(&self, op: F) -> Result<T, SchedulerError>
    where
        F: FnOnce(&dyn LedgerStore) -> Result<T, SchedulerError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|e| SchedulerError::Ledger(format!("ledger task failed: {e}")))?
    }

    async fn load(&self, base: &str) -> Result<Option<LedgerEntry>, SchedulerError> {
        let base = base.to_string();
        self.on_store(move |store| store.load_entry(&base)).await
    }

    /// Apply `transition` to the entry for `base` and persist the full entry.
    ///
    /// Returns the resulting entry.
    pub async fn update(&self, base: &str, transition: LedgerTransition) -> LedgerEntry {
        let mut cache = self.cache.lock().await;
        let mut entry = match self.load(base).await {
            Ok(Some(entry)) => entry,
            Ok(None) => cache
                .get(base)
                .cloned()
                .unwrap_or_else(|| LedgerEntry::new(base)),
            Err(e) => {
                warn!(base = base, error = %e, "ledger load failed, using last known entry");
                cache
                    .get(base)
                    .cloned()
                    .unwrap_or_else(|| LedgerEntry::new(base))
            }
        };
        if let Some(known) = cache.get(base) {
            // The store lags behind after a failed save.
            if entry.status != LedgerStatus::Done && known.watermark > entry.watermark {
                entry.watermark = known.watermark;
            }
        }

        transition.apply(&mut entry);
        entry.last_update = Some(timestamp());

        let snapshot = entry.clone();
        if let Err(e) = self.on_store(move |store| store.save_entry(&snapshot)).await {
            error!(base = base, error = %e, ?transition, "ledger save failed");
        } else {
            debug!(
                base = base,
                status = %entry.status,
                watermark = entry.watermark,
                "ledger updated"
            );
        }
        cache.insert(base.to_string(), entry.clone());
        entry
    }

    /// Current entry for `base`: the store's view, else the last known entry.
    pub async fn entry(&self, base: &str) -> Option<LedgerEntry> {
        match self.load(base).await {
            Ok(Some(entry)) => Some(entry),
            Ok(None) => self.cache.lock().await.get(base).cloned(),
            Err(e) => {
                warn!(base = base, error = %e, "ledger load failed");
                self.cache.lock().await.get(base).cloned()
            }
        }
    }
}
