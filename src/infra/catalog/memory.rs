//! In-memory job catalog.

use std::collections::BTreeMap;

use crate::core::{JobCatalog, SchedulerError};
use crate::util::serde::{SceneId, SceneMap};

/// Catalog built from literal pool → scene maps.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    bases: BTreeMap<String, BTreeMap<String, SceneMap>>,
}

impl InMemoryCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pool to `base` with the given scene ids; prompts are generated.
    #[must_use]
    pub fn with_pool(
        mut self,
        base: &str,
        pool: &str,
        scenes: impl IntoIterator<Item = SceneId>,
    ) -> Self {
        let map = scenes
            .into_iter()
            .map(|id| (id, format!("prompt for scene {id}")))
            .collect();
        self.insert(base, pool, map);
        self
    }

    /// Add or replace a pool's scene map.
    pub fn insert(&mut self, base: &str, pool: &str, scenes: SceneMap) {
        self.bases
            .entry(base.to_string())
            .or_default()
            .insert(pool.to_string(), scenes);
    }
}

impl JobCatalog for InMemoryCatalog {
    fn pools(&self, base: &str) -> Result<Vec<String>, SchedulerError> {
        Ok(self
            .bases
            .get(base)
            .map(|pools| {
                pools
                    .iter()
                    .filter(|(_, scenes)| !scenes.is_empty())
                    .map(|(pool, _)| pool.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn scenes_for_pool(&self, base: &str, pool: &str) -> Result<SceneMap, SchedulerError> {
        self.bases
            .get(base)
            .and_then(|pools| pools.get(pool))
            .cloned()
            .ok_or_else(|| SchedulerError::Catalog(format!("unknown pool `{pool}` for `{base}`")))
    }

    fn bases(&self) -> Result<Vec<String>, SchedulerError> {
        Ok(self.bases.keys().cloned().collect())
    }
}
