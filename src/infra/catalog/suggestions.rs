//! Catalog reading per-pool suggestion files.
//!
//! Each base owns a directory `<root>/<base>/` holding one file per pool named
//! `<base>__<pool>.txt`. A file lists scenes as a `Scene <n>` line followed by a
//! `Suggestion: <prompt>` line; anything else is ignored.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::{JobCatalog, SchedulerError};
use crate::util::serde::SceneMap;

const FILE_EXT: &str = "txt";
const POOL_SEPARATOR: &str = "__";

/// Job catalog over a suggestions directory.
#[derive(Debug, Clone)]
pub struct SuggestionFileCatalog {
    root: PathBuf,
}

impl SuggestionFileCatalog {
    /// Catalog rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pool_file(&self, base: &str, pool: &str) -> PathBuf {
        self.root
            .join(base)
            .join(format!("{base}{POOL_SEPARATOR}{pool}.{FILE_EXT}"))
    }

    /// Pool names with a suggestion file for `base`, sorted, regardless of content.
    fn pool_files(&self, base: &str) -> Result<Vec<String>, SchedulerError> {
        let dir = self.root.join(base);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let prefix = format!("{base}{POOL_SEPARATOR}");
        let mut pools = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| catalog_err(&dir, e))? {
            let path = entry.map_err(|e| catalog_err(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(pool) = stem.strip_prefix(&prefix).filter(|p| !p.is_empty()) {
                pools.push(pool.to_string());
            }
        }
        pools.sort();
        Ok(pools)
    }
}

fn catalog_err(path: &Path, e: std::io::Error) -> SchedulerError {
    SchedulerError::Catalog(format!("{}: {e}", path.display()))
}

/// Parse suggestion-file text into a scene map.
///
/// A `Scene` line whose second token is not a number resets the current scene, and
/// a `Suggestion:` line without a preceding valid `Scene` line is skipped.
pub fn parse_suggestions(text: &str) -> SceneMap {
    let mut scenes = SceneMap::new();
    let mut current = None;
    for line in text.lines() {
        if line.starts_with("Scene ") {
            current = line
                .split_whitespace()
                .nth(1)
                .filter(|tok| tok.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|tok| tok.parse().ok());
        } else if let Some(prompt) = line.strip_prefix("Suggestion:") {
            if let Some(scene) = current.take() {
                scenes.insert(scene, prompt.trim().to_string());
            }
        }
    }
    scenes
}

impl JobCatalog for SuggestionFileCatalog {
    fn pools(&self, base: &str) -> Result<Vec<String>, SchedulerError> {
        let mut pools = Vec::new();
        for pool in self.pool_files(base)? {
            if self.scenes_for_pool(base, &pool)?.is_empty() {
                debug!(base = base, pool = %pool, "suggestion file has no scenes");
                continue;
            }
            pools.push(pool);
        }
        Ok(pools)
    }

    fn scenes_for_pool(&self, base: &str, pool: &str) -> Result<SceneMap, SchedulerError> {
        let path = self.pool_file(base, pool);
        if !path.is_file() {
            return Ok(SceneMap::new());
        }
        let text = fs::read_to_string(&path).map_err(|e| catalog_err(&path, e))?;
        Ok(parse_suggestions(&text))
    }

    fn bases(&self) -> Result<Vec<String>, SchedulerError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut bases = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| catalog_err(&self.root, e))? {
            let entry = entry.map_err(|e| catalog_err(&self.root, e))?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    bases.push(name.to_string());
                }
            }
        }
        bases.sort();
        Ok(bases)
    }
}
