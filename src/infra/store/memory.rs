//! In-memory artifact store.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::core::{ArtifactStore, SchedulerError};
use crate::util::serde::{ArtifactPayload, SceneId};

/// Artifact store keeping `(base, scene)` pairs in memory.
///
/// A scene counts as complete once any payload was saved for it.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    scenes: Mutex<HashMap<String, HashSet<SceneId>>>,
    saves: Mutex<HashMap<(String, SceneId), usize>>,
}

impl InMemoryArtifactStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with completed scenes for `base`.
    pub fn with_complete(base: &str, scenes: impl IntoIterator<Item = SceneId>) -> Self {
        let store = Self::new();
        store.mark_complete(base, scenes);
        store
    }

    /// Mark scenes complete without going through `save`.
    pub fn mark_complete(&self, base: &str, scenes: impl IntoIterator<Item = SceneId>) {
        self.scenes
            .lock()
            .entry(base.to_string())
            .or_default()
            .extend(scenes);
    }

    /// Number of `save` calls that stored something for a scene.
    pub fn save_count(&self, base: &str, scene: SceneId) -> usize {
        self.saves
            .lock()
            .get(&(base.to_string(), scene))
            .copied()
            .unwrap_or(0)
    }

    /// Completed scenes of `base`, sorted.
    pub fn complete(&self, base: &str) -> Vec<SceneId> {
        let mut ids: Vec<_> = self
            .scenes
            .lock()
            .get(base)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn save(
        &self,
        base: &str,
        scene: SceneId,
        payloads: &[ArtifactPayload],
    ) -> Result<usize, SchedulerError> {
        let stored = payloads.iter().filter(|p| !p.is_empty()).count();
        if stored > 0 {
            self.mark_complete(base, [scene]);
            *self
                .saves
                .lock()
                .entry((base.to_string(), scene))
                .or_default() += 1;
        }
        Ok(stored)
    }

    fn exists(&self, base: &str, scene: SceneId) -> bool {
        self.scenes
            .lock()
            .get(base)
            .is_some_and(|s| s.contains(&scene))
    }
}
