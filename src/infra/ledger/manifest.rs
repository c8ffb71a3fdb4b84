//! JSON manifest ledger store.
//!
//! The manifest is shared with other pipeline stages: a JSON object mapping each
//! base to an object of stage fields. This store owns `images`, `images_saved` and
//! `last_update` and leaves every other field untouched. Writes go to a sibling
//! temp file which is then renamed over the manifest.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::core::{LedgerEntry, LedgerStatus, LedgerStore, SchedulerError};
use crate::util::serde::SceneId;

const IMAGES_KEY: &str = "images";
const IMAGES_SAVED_KEY: &str = "images_saved";
const LAST_UPDATE_KEY: &str = "last_update";
const SUGGESTIONS_KEY: &str = "suggestions";

type Manifest = Map<String, Value>;

/// Ledger store backed by the pipeline manifest file.
#[derive(Debug)]
pub struct ManifestLedgerStore {
    path: PathBuf,
    io: Mutex<()>,
}

impl ManifestLedgerStore {
    /// Store reading and writing `path`. The file is created on first save.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            io: Mutex::new(()),
        }
    }

    /// Manifest location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Manifest, SchedulerError> {
        if !self.path.exists() {
            return Ok(Manifest::new());
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| SchedulerError::Ledger(format!("{}: {e}", self.path.display())))?;
        if raw.trim().is_empty() {
            return Ok(Manifest::new());
        }
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(SchedulerError::Ledger(format!(
                "{}: manifest root is not an object",
                self.path.display()
            ))),
            Err(e) => Err(SchedulerError::Ledger(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }

    fn write(&self, manifest: &Manifest) -> Result<(), SchedulerError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| SchedulerError::Ledger(e.to_string()))?;
        }
        let body = serde_json::to_string_pretty(manifest)
            .map_err(|e| SchedulerError::Ledger(e.to_string()))?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, body).map_err(|e| SchedulerError::Ledger(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| SchedulerError::Ledger(e.to_string()))
    }

    /// Bases with work for the image stage: manifest bases sorted by name, then
    /// catalog bases in the order given.
    ///
    /// A base qualifies when its `suggestions` stage is `done` and `images` is not,
    /// or when it appears in `catalog_bases` but not in the manifest at all.
    pub fn pending_bases(&self, catalog_bases: &[String]) -> Result<Vec<String>, SchedulerError> {
        let manifest = {
            let _io = self.io.lock();
            self.read()?
        };
        let stage = |fields: &Value, key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_owned)
        };

        let from_manifest = manifest.iter().filter_map(|(base, fields)| {
            let ready = stage(fields, SUGGESTIONS_KEY).as_deref() == Some("done");
            let finished = stage(fields, IMAGES_KEY).as_deref() == Some("done");
            (ready && !finished).then(|| base.clone())
        });
        let unknown = catalog_bases
            .iter()
            .filter(|base| !manifest.contains_key(base.as_str()))
            .cloned();

        let mut seen = HashSet::new();
        Ok(from_manifest
            .chain(unknown)
            .filter(|base| seen.insert(base.clone()))
            .collect())
    }
}

fn parse_status(value: Option<&Value>) -> LedgerStatus {
    match value.and_then(Value::as_str) {
        Some("done") => LedgerStatus::Done,
        Some("in_progress") => LedgerStatus::InProgress,
        _ => LedgerStatus::Pending,
    }
}

fn parse_watermark(value: Option<&Value>) -> SceneId {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| SceneId::try_from(n).ok())
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

impl LedgerStore for ManifestLedgerStore {
    fn load_entry(&self, base: &str) -> Result<Option<LedgerEntry>, SchedulerError> {
        let manifest = {
            let _io = self.io.lock();
            self.read()?
        };
        let Some(fields) = manifest.get(base) else {
            return Ok(None);
        };
        let owned = fields.get(IMAGES_KEY).is_some();
        Ok(Some(LedgerEntry {
            base: base.to_string(),
            status: parse_status(fields.get(IMAGES_KEY)),
            watermark: parse_watermark(fields.get(IMAGES_SAVED_KEY)),
            // `last_update` may have been stamped by another stage.
            last_update: owned
                .then(|| fields.get(LAST_UPDATE_KEY).and_then(Value::as_str))
                .flatten()
                .map(str::to_owned),
        }))
    }

    fn save_entry(&self, entry: &LedgerEntry) -> Result<(), SchedulerError> {
        let _io = self.io.lock();
        let mut manifest = self.read()?;
        let slot = manifest
            .entry(entry.base.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(fields) = slot {
            fields.insert(IMAGES_KEY.into(), Value::from(entry.status.to_string()));
            fields.insert(IMAGES_SAVED_KEY.into(), Value::from(entry.watermark));
            if let Some(ts) = &entry.last_update {
                fields.insert(LAST_UPDATE_KEY.into(), Value::from(ts.as_str()));
            }
        }
        self.write(&manifest)
    }
}
