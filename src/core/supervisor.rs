//! Pool supervisor: one queue, N workers, one drain barrier.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info};

use crate::core::worker::{run_worker, WorkerContext};
use crate::core::{ProgressReporter, QueueStats, SchedulerError, SharedProgressSink, WorkQueue};
use crate::util::serde::SceneId;

/// What a supervisor hands back to the coordinator for one batch.
#[derive(Debug, Clone, Default)]
pub struct PoolReport {
    /// Pool name.
    pub pool: String,
    /// Scenes actually queued (the incomplete part of the input batch).
    pub queued: Vec<SceneId>,
    /// Scenes workers reported as failed.
    pub failures: Vec<SceneId>,
    /// Successful jobs.
    pub rendered: usize,
    /// Input scenes the oracle still reports incomplete after the drain.
    pub remainder: Vec<SceneId>,
    /// Queue delivery counters.
    pub queue: QueueStats,
}

/// Runs batches for one pool against its session.
#[derive(Clone)]
pub struct PoolSupervisor {
    ctx: Arc<WorkerContext>,
    workers: usize,
    progress: Option<SharedProgressSink>,
}

impl PoolSupervisor {
    /// Supervisor running `workers` workers per batch.
    pub fn new(
        ctx: Arc<WorkerContext>,
        workers: usize,
        progress: Option<SharedProgressSink>,
    ) -> Self {
        Self {
            ctx,
            workers,
            progress,
        }
    }

    /// Pool name.
    pub fn pool(&self) -> &str {
        &self.ctx.pool
    }

    /// Process `batch` and return the oracle-confirmed remainder.
    ///
    /// Only the currently incomplete scenes of `batch` are queued. The method returns
    /// after every worker has drained the queue and acknowledged its sentinel, or as
    /// soon as every worker has died with scenes still queued; those scenes then show
    /// up in the remainder.
    ///
    /// # Errors
    ///
    /// Fails if the queue cannot be built or sealed; the caller must then treat the
    /// whole batch as remaining.
    pub async fn run(&self, batch: &[SceneId]) -> Result<PoolReport, SchedulerError> {
        let ctx = &self.ctx;
        let mut report = PoolReport {
            pool: ctx.pool.clone(),
            ..PoolReport::default()
        };
        if batch.is_empty() {
            return Ok(report);
        }

        let pending = ctx.oracle.pending(&ctx.base, batch);
        if pending.is_empty() {
            debug!(pool = %ctx.pool, "batch already complete");
            return Ok(report);
        }

        let queue = Arc::new(WorkQueue::new(ctx.pool.clone(), &pending, self.workers)?);
        let reporter = Arc::new(ProgressReporter::new(
            ctx.base.clone(),
            ctx.pool.clone(),
            pending.len(),
            self.progress.clone(),
        ));
        info!(
            pool = %ctx.pool,
            scenes = pending.len(),
            workers = self.workers,
            "dispatching batch"
        );

        let handles: Vec<_> = (1..=self.workers)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&queue),
                    Arc::clone(ctx),
                    Arc::clone(&reporter),
                ))
            })
            .collect();

        let workers = join_all(handles);
        tokio::pin!(workers);
        let mut stopped_early = None;
        tokio::select! {
            () = queue.join() => {}
            results = &mut workers => stopped_early = Some(results),
        }
        let results = match stopped_early {
            Some(results) => {
                error!(
                    pool = %ctx.pool,
                    unacknowledged = queue.len(),
                    "all workers stopped before the queue drained"
                );
                results
            }
            None => {
                queue.seal(self.workers)?;
                workers.await
            }
        };

        for result in results {
            match result {
                Ok(worker) => {
                    report.rendered += worker.succeeded();
                    report.failures.extend(worker.failed());
                }
                Err(e) => {
                    error!(pool = %ctx.pool, error = %e, "worker terminated abnormally");
                }
            }
        }

        report.failures.sort_unstable();
        report.queued = pending;
        report.queue = queue.stats();
        report.remainder = ctx.oracle.pending(&ctx.base, batch);
        info!(
            pool = %ctx.pool,
            rendered = report.rendered,
            remaining = report.remainder.len(),
            "batch settled"
        );
        Ok(report)
    }
}
