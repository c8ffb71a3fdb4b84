//! Serializable identifiers and value types shared across the scheduler.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Scene identifier, unique within a base.
pub type SceneId = u32;

/// Ordered scene id to prompt mapping for one pool.
pub type SceneMap = BTreeMap<SceneId, String>;

/// Opaque artifact bytes returned by a render session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPayload {
    /// Raw artifact bytes (e.g. an encoded image).
    pub bytes: Vec<u8>,
}

impl ArtifactPayload {
    /// Wrap raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ArtifactPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactPayload")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Zero-padded scene label used in artifact names and log lines (`7` -> `007`).
#[must_use]
pub fn scene_label(scene: SceneId) -> String {
    format!("{scene:03}")
}

/// Render up to `limit` scene labels as a comma-separated sample with an ellipsis.
#[must_use]
pub fn sample_scenes(scenes: &[SceneId], limit: usize) -> String {
    let sample = scenes
        .iter()
        .take(limit)
        .map(|s| scene_label(*s))
        .collect::<Vec<_>>()
        .join(", ");
    if scenes.len() > limit {
        format!("{sample}...")
    } else {
        sample
    }
}
