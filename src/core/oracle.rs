//! Artifact storage and the completion oracle built on top of it.

use std::sync::Arc;

use crate::core::SchedulerError;
use crate::util::serde::{ArtifactPayload, SceneId};

/// Durable artifact storage.
pub trait ArtifactStore: Send + Sync + 'static {
    /// Persist the payloads produced for a scene and return how many were written.
    fn save(
        &self,
        base: &str,
        scene: SceneId,
        payloads: &[ArtifactPayload],
    ) -> Result<usize, SchedulerError>;

    /// Whether every expected artifact for the scene exists.
    fn exists(&self, base: &str, scene: SceneId) -> bool;
}

/// Ground truth for "is this scene done".
///
/// Implementations must not cache: artifacts may be written by an earlier run or by
/// another process between two calls.
pub trait CompletionOracle: Send + Sync + 'static {
    /// Whether all expected artifacts for the scene exist.
    fn is_complete(&self, base: &str, scene: SceneId) -> bool;

    /// The subset of `scenes` still incomplete, in input order.
    fn pending(&self, base: &str, scenes: &[SceneId]) -> Vec<SceneId> {
        scenes
            .iter()
            .copied()
            .filter(|s| !self.is_complete(base, *s))
            .collect()
    }

    /// Highest scene id among `scenes` that is complete.
    fn highest_complete(&self, base: &str, scenes: &[SceneId]) -> Option<SceneId> {
        scenes
            .iter()
            .copied()
            .filter(|s| self.is_complete(base, *s))
            .max()
    }
}

/// Oracle answering from an [`ArtifactStore`]'s existence check.
#[derive(Clone)]
pub struct StoreOracle {
    store: Arc<dyn ArtifactStore>,
}

impl StoreOracle {
    /// Build an oracle over a store.
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }
}

impl CompletionOracle for StoreOracle {
    fn is_complete(&self, base: &str, scene: SceneId) -> bool {
        self.store.exists(base, scene)
    }
}
