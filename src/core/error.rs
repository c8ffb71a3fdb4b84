//! Error types for scheduler operations.

use thiserror::Error;

use crate::util::serde::SceneId;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The job catalog could not be built for a base.
    #[error("catalog error: {0}")]
    Catalog(String),
    /// The catalog produced no usable pools for a base.
    #[error("no pools with scenes for base `{0}`")]
    EmptyCatalog(String),
    /// A render call failed for a scene.
    #[error("render failed for scene {scene}: {reason}")]
    Render {
        /// Scene being rendered.
        scene: SceneId,
        /// Backend-provided reason.
        reason: String,
    },
    /// A render call returned no artifacts.
    #[error("render returned no artifacts for scene {0}")]
    EmptyRender(SceneId),
    /// A render call exceeded the configured timeout.
    #[error("render timed out for scene {0}")]
    RenderTimeout(SceneId),
    /// A pool's rendering session could not be opened.
    #[error("session for pool `{pool}` unavailable: {reason}")]
    SessionUnavailable {
        /// Pool whose session failed.
        pool: String,
        /// Backend-provided reason.
        reason: String,
    },
    /// A pool supervisor terminated abnormally.
    #[error("supervisor for pool `{pool}` failed: {reason}")]
    Supervisor {
        /// Pool whose supervisor failed.
        pool: String,
        /// Failure description.
        reason: String,
    },
    /// Artifact persistence failed.
    #[error("storage error: {0}")]
    Storage(String),
    /// Ledger load or save failed.
    #[error("ledger error: {0}")]
    Ledger(String),
    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<std::io::Error> for SchedulerError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
