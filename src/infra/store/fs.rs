//! Filesystem artifact store.
//!
//! Layout: `<root>/<base>/_0<k>/<NNN>.jpg` for variant `k` in `1..=variants`.
//! A scene is complete once every variant file exists.

use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::MAX_VARIANTS_PER_SCENE;
use crate::core::{ArtifactStore, SchedulerError};
use crate::util::serde::{scene_label, ArtifactPayload, SceneId};

/// Artifact store writing one JPEG per variant directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
    variants: usize,
    stride: usize,
}

impl FsArtifactStore {
    /// Store under `root` expecting `variants` files per scene (clamped to 1..=4).
    ///
    /// Render calls return two payloads per variant, so only every second payload
    /// is kept by default. See [`FsArtifactStore::with_stride`].
    pub fn new(root: impl AsRef<Path>, variants: usize) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            variants: variants.clamp(1, MAX_VARIANTS_PER_SCENE),
            stride: 2,
        }
    }

    /// Keep every `stride`-th payload, starting with the first (0 is treated as 1).
    #[must_use]
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride.max(1);
        self
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Variants expected per scene.
    pub const fn variants(&self) -> usize {
        self.variants
    }

    fn variant_dir(&self, base: &str, variant: usize) -> PathBuf {
        self.root.join(base).join(format!("_0{variant}"))
    }

    /// Every file that must exist for `scene` to be complete.
    pub fn expected_paths(&self, base: &str, scene: SceneId) -> Vec<PathBuf> {
        let file = format!("{}.jpg", scene_label(scene));
        (1..=self.variants)
            .map(|variant| self.variant_dir(base, variant).join(&file))
            .collect()
    }
}

impl ArtifactStore for FsArtifactStore {
    fn save(
        &self,
        base: &str,
        scene: SceneId,
        payloads: &[ArtifactPayload],
    ) -> Result<usize, SchedulerError> {
        let kept = payloads.iter().step_by(self.stride).take(self.variants);
        let mut saved = 0;
        for (payload, path) in kept.zip(self.expected_paths(base, scene)) {
            if let Some(dir) = path.parent() {
                create_dir_all(dir)?;
            }
            let written = File::create(&path).and_then(|mut f| f.write_all(&payload.bytes));
            match written {
                Ok(()) => saved += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to write artifact");
                }
            }
        }
        Ok(saved)
    }

    fn exists(&self, base: &str, scene: SceneId) -> bool {
        self.expected_paths(base, scene).iter().all(|p| p.is_file())
    }
}
