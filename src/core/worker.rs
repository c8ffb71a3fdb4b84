//! Worker loop: pull scenes, render, persist, verify, report.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::core::{
    ArtifactStore, CompletionOracle, LedgerTransition, ProgressLedger, ProgressReporter,
    QueueItem, RenderRequest, RenderSession, SchedulerError, WorkQueue,
};
use crate::util::serde::{ArtifactPayload, SceneId, SceneMap};

/// Result of one job.
#[derive(Debug)]
pub struct JobOutcome {
    /// Scene processed.
    pub scene: SceneId,
    /// Pool that processed it.
    pub pool: String,
    /// Artifacts persisted, or the reason the job failed.
    pub result: Result<usize, SchedulerError>,
}

impl JobOutcome {
    /// Whether the job produced confirmed artifacts.
    pub const fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Everything a worker reports back to its supervisor.
#[derive(Debug, Default)]
pub struct WorkerReport {
    /// Worker index within the pool.
    pub worker_id: usize,
    /// Outcomes in processing order.
    pub outcomes: Vec<JobOutcome>,
    /// Whether the worker stopped on a sentinel (as opposed to a torn-down queue).
    pub acknowledged_sentinel: bool,
}

impl WorkerReport {
    /// Scenes whose job failed.
    pub fn failed(&self) -> impl Iterator<Item = SceneId> + '_ {
        self.outcomes
            .iter()
            .filter(|o| !o.succeeded())
            .map(|o| o.scene)
    }

    /// Number of successful jobs.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }
}

/// Shared, read-only state for every worker of one pool.
pub struct WorkerContext {
    /// Base being rendered.
    pub base: String,
    /// Pool name.
    pub pool: String,
    /// Scene prompts for the pool.
    pub scenes: Arc<SceneMap>,
    /// The pool's rendering session.
    pub session: Arc<dyn RenderSession>,
    /// Artifact persistence.
    pub store: Arc<dyn ArtifactStore>,
    /// Completion ground truth.
    pub oracle: Arc<dyn CompletionOracle>,
    /// Durable progress.
    pub ledger: Arc<ProgressLedger>,
    /// Optional cap on a single render call.
    pub render_timeout: Option<Duration>,
}

impl WorkerContext {
    async fn render_and_persist(&self, scene: SceneId) -> Result<usize, SchedulerError> {
        let prompt = self.scenes.get(&scene).ok_or_else(|| {
            SchedulerError::Catalog(format!("scene {scene} not in pool `{}`", self.pool))
        })?;
        let req = RenderRequest {
            base: &self.base,
            pool: &self.pool,
            scene,
            prompt,
        };
        // A timed-out render is dropped, never left running beside a retry.
        let payloads = match self.render_timeout {
            Some(limit) => tokio::time::timeout(limit, self.session.render(req))
                .await
                .map_err(|_| SchedulerError::RenderTimeout(scene))??,
            None => self.session.render(req).await?,
        };
        if payloads.is_empty() {
            return Err(SchedulerError::EmptyRender(scene));
        }

        self.persist(scene, payloads).await
    }

    /// Save the payloads and confirm the scene through the oracle, off the runtime threads.
    async fn persist(
        &self,
        scene: SceneId,
        payloads: Vec<ArtifactPayload>,
    ) -> Result<usize, SchedulerError> {
        let base = self.base.clone();
        let store = Arc::clone(&self.store);
        let oracle = Arc::clone(&self.oracle);
        tokio::task::spawn_blocking(move || {
            let saved = store.save(&base, scene, &payloads)?;
            if saved == 0 || !oracle.is_complete(&base, scene) {
                return Err(SchedulerError::Storage(format!(
                    "scene {scene} incomplete after saving {saved} of {} artifact(s)",
                    payloads.len()
                )));
            }
            Ok(saved)
        })
        .await
        .map_err(|e| SchedulerError::Storage(format!("scene {scene} persist task failed: {e}")))?
    }

    /// Render and persist one scene; a panic anywhere in the job becomes a failure.
    async fn guarded(&self, scene: SceneId) -> Result<usize, SchedulerError> {
        AssertUnwindSafe(self.render_and_persist(scene))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                error!(pool = %self.pool, scene = scene, "render job panicked");
                Err(SchedulerError::Render {
                    scene,
                    reason: format!("job panicked: {}", panic_message(panic.as_ref())),
                })
            })
    }

    /// Process one scene, updating the ledger and reporter on success.
    pub async fn process(&self, scene: SceneId, reporter: &ProgressReporter) -> JobOutcome {
        let result = self.guarded(scene).await;
        match &result {
            Ok(saved) => {
                self.ledger
                    .update(&self.base, LedgerTransition::Advance(scene))
                    .await;
                reporter.job_completed(scene);
                debug!(pool = %self.pool, scene = scene, saved = saved, "scene rendered");
            }
            Err(e) => {
                warn!(pool = %self.pool, scene = scene, error = %e, "scene failed");
            }
        }
        JobOutcome {
            scene,
            pool: self.pool.clone(),
            result,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Run one worker until it receives a sentinel.
///
/// A failed or panicking job never stops the loop; it is recorded and the worker
/// moves on.
pub async fn run_worker(
    worker_id: usize,
    queue: Arc<WorkQueue>,
    ctx: Arc<WorkerContext>,
    reporter: Arc<ProgressReporter>,
) -> WorkerReport {
    debug!(pool = %ctx.pool, worker_id = worker_id, "worker started");
    let mut report = WorkerReport {
        worker_id,
        ..WorkerReport::default()
    };

    while let Some(item) = queue.acquire().await {
        match item {
            QueueItem::Sentinel => {
                report.acknowledged_sentinel = true;
                break;
            }
            QueueItem::Scene(scene) => {
                let _done = queue.done_guard();
                let outcome = ctx.process(scene, &reporter).await;
                report.outcomes.push(outcome);
            }
        }
    }

    debug!(
        pool = %ctx.pool,
        worker_id = worker_id,
        processed = report.outcomes.len(),
        "worker exiting"
    );
    report
}
