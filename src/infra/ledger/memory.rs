//! In-memory ledger store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::core::{LedgerEntry, LedgerStore, SchedulerError};

/// Ledger store holding entries in a map.
///
/// Writes can be switched off to simulate an unwritable manifest.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    entries: Mutex<HashMap<String, LedgerEntry>>,
    history: Mutex<Vec<LedgerEntry>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl InMemoryLedgerStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry.
    pub fn insert(&self, entry: LedgerEntry) {
        self.entries.lock().insert(entry.base.clone(), entry);
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Every successfully saved entry, in save order.
    pub fn history(&self) -> Vec<LedgerEntry> {
        self.history.lock().clone()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn load_entry(&self, base: &str) -> Result<Option<LedgerEntry>, SchedulerError> {
        Ok(self.entries.lock().get(base).cloned())
    }

    fn save_entry(&self, entry: &LedgerEntry) -> Result<(), SchedulerError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(SchedulerError::Ledger("ledger is read-only".into()));
        }
        self.entries.lock().insert(entry.base.clone(), entry.clone());
        self.history.lock().push(entry.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
