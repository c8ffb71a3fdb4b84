//! Rendering backend abstraction.
//!
//! A [`RenderBackend`] hands out one [`RenderSession`] per pool. The session is the
//! isolated execution context for that pool (for example one authenticated browser
//! profile) and is shared by all of the pool's workers for the duration of a run.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::SchedulerError;
use crate::util::serde::{ArtifactPayload, SceneId};

/// Identifies the job a session is asked to render.
#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    /// Base unit of work.
    pub base: &'a str,
    /// Pool running the job.
    pub pool: &'a str,
    /// Scene being rendered.
    pub scene: SceneId,
    /// Opaque prompt text for the scene.
    pub prompt: &'a str,
}

/// A pool-scoped rendering context.
///
/// `render` may be called concurrently by several workers of the same pool.
/// An empty artifact list is a soft failure and is handled exactly like an error.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use render_lanes::core::{RenderRequest, RenderSession, SchedulerError};
/// use render_lanes::util::ArtifactPayload;
///
/// struct EchoSession;
///
/// #[async_trait]
/// impl RenderSession for EchoSession {
///     async fn render(&self, req: RenderRequest<'_>) -> Result<Vec<ArtifactPayload>, SchedulerError> {
///         Ok(vec![ArtifactPayload::new(req.prompt.as_bytes())])
///     }
/// }
/// ```
#[async_trait]
pub trait RenderSession: Send + Sync + 'static {
    /// Render one scene and return the produced artifact payloads.
    async fn render(
        &self,
        req: RenderRequest<'_>,
    ) -> Result<Vec<ArtifactPayload>, SchedulerError>;

    /// Release the session. Called once after every worker of the pool has drained.
    async fn close(&self) -> Result<(), SchedulerError> {
        Ok(())
    }
}

/// Factory for per-pool rendering sessions.
#[async_trait]
pub trait RenderBackend: Send + Sync + 'static {
    /// Pools this backend can serve. `None` means any pool is accepted.
    fn available_pools(&self) -> Option<Vec<String>> {
        None
    }

    /// Acquire the execution context for `pool`.
    async fn open_session(&self, pool: &str) -> Result<Arc<dyn RenderSession>, SchedulerError>;
}
