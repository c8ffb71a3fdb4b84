//! Global coordinator: runs every pool of a base, drives retry rounds, finalizes the
//! ledger.
//!
//! Phases per base:
//!
//! ```text
//! DISCOVER -> ASSIGN -> DISPATCH -> SETTLE -> (RETRY_DECISION -> DISPATCH)* -> FINALIZE
//! ```
//!
//! Scheduling decisions always come from the completion oracle. The ledger is only
//! written, never consulted, when deciding what to render.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::core::worker::WorkerContext;
use crate::core::{
    ArtifactStore, CompletionOracle, JobCatalog, LedgerStatus, LedgerTransition, PoolReport,
    PoolSupervisor, ProgressLedger, RenderBackend, RenderSession, RetryPolicy, SchedulerError,
    SharedProgressSink,
};
use crate::util::serde::{sample_scenes, SceneId, SceneMap};

/// Coordinator phase, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Compute per-pool pending scenes.
    Discover,
    /// Open one session per pool with pending work.
    Assign,
    /// Run supervisors concurrently.
    Dispatch,
    /// Collect remainders.
    Settle,
    /// Ask the retry policy per pool.
    RetryDecision,
    /// Recompute completion and write the final ledger state.
    Finalize,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Discover => "discover",
            Self::Assign => "assign",
            Self::Dispatch => "dispatch",
            Self::Settle => "settle",
            Self::RetryDecision => "retry_decision",
            Self::Finalize => "finalize",
        };
        f.write_str(s)
    }
}

/// Tunables for a coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Workers spawned per pool batch.
    pub workers_per_pool: usize,
    /// Pause between opening consecutive pool sessions.
    pub pool_open_stagger: Duration,
    /// Optional cap on a single render call.
    pub render_timeout: Option<Duration>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            workers_per_pool: 2,
            pool_open_stagger: Duration::from_secs(1),
            render_timeout: None,
        }
    }
}

/// Outcome of one base run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Base processed.
    pub base: String,
    /// Run identifier attached to log records.
    pub run_id: Uuid,
    /// Final ledger status.
    pub status: LedgerStatus,
    /// Final ledger watermark.
    pub watermark: SceneId,
    /// Retry rounds executed after the initial dispatch.
    pub retry_rounds: u32,
    /// Successful jobs across all rounds.
    pub rendered: usize,
    /// Scenes still incomplete at finalize, per pool.
    pub remaining: BTreeMap<String, Vec<SceneId>>,
    /// Worker-reported failures across all rounds, per pool.
    pub failures: BTreeMap<String, Vec<SceneId>>,
    /// Pools whose session could not be opened.
    pub unavailable_pools: Vec<String>,
    /// Input scene sets per round, per pool (round 0 is the initial dispatch).
    pub rounds: Vec<BTreeMap<String, Vec<SceneId>>>,
}

impl RunSummary {
    fn new(base: &str, run_id: Uuid) -> Self {
        Self {
            base: base.to_string(),
            run_id,
            status: LedgerStatus::Pending,
            watermark: 0,
            retry_rounds: 0,
            rendered: 0,
            remaining: BTreeMap::new(),
            failures: BTreeMap::new(),
            unavailable_pools: Vec::new(),
            rounds: Vec::new(),
        }
    }

    /// Whether every scene of the base is complete.
    pub fn is_done(&self) -> bool {
        self.status == LedgerStatus::Done
    }

    /// Total number of worker-reported failures.
    pub fn failure_count(&self) -> usize {
        self.failures.values().map(Vec::len).sum()
    }
}

/// One pool's immutable catalog slice.
struct Lane {
    pool: String,
    scenes: Arc<SceneMap>,
}

impl Lane {
    fn scene_ids(&self) -> Vec<SceneId> {
        self.scenes.keys().copied().collect()
    }
}

/// Drives every pool of a base to completion or exhaustion.
pub struct Coordinator {
    catalog: Arc<dyn JobCatalog>,
    backend: Arc<dyn RenderBackend>,
    store: Arc<dyn ArtifactStore>,
    oracle: Arc<dyn CompletionOracle>,
    ledger: Arc<ProgressLedger>,
    retry: Arc<dyn RetryPolicy>,
    progress: Option<SharedProgressSink>,
    settings: CoordinatorSettings,
}

impl Coordinator {
    /// Assemble a coordinator from its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<dyn JobCatalog>,
        backend: Arc<dyn RenderBackend>,
        store: Arc<dyn ArtifactStore>,
        oracle: Arc<dyn CompletionOracle>,
        ledger: Arc<ProgressLedger>,
        retry: Arc<dyn RetryPolicy>,
        progress: Option<SharedProgressSink>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            catalog,
            backend,
            store,
            oracle,
            ledger,
            retry,
            progress,
            settings,
        }
    }

    /// The ledger this coordinator writes to.
    pub fn ledger(&self) -> &Arc<ProgressLedger> {
        &self.ledger
    }

    /// The coordinator's settings.
    pub const fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Run one base to completion or until no pool accepts another retry.
    ///
    /// # Errors
    ///
    /// Only catalog failures abort a run, and they do so before anything is
    /// dispatched. Every other failure ends up in the summary's remainders.
    pub async fn run_base(&self, base: &str) -> Result<RunSummary, SchedulerError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run_base", base = base, run_id = %run_id);
        self.run_base_inner(base, run_id).instrument(span).await
    }

    async fn run_base_inner(&self, base: &str, run_id: Uuid) -> Result<RunSummary, SchedulerError> {
        let mut summary = RunSummary::new(base, run_id);

        debug!(phase = %RunPhase::Discover, "building catalog");
        let lanes = self.build_lanes(base)?;
        let mut pending: BTreeMap<String, Vec<SceneId>> = BTreeMap::new();
        for lane in &lanes {
            let ids = self.oracle.pending(base, &lane.scene_ids());
            if ids.is_empty() {
                info!(pool = %lane.pool, "pool already complete, not opening a session");
            } else {
                info!(
                    pool = %lane.pool,
                    pending = ids.len(),
                    sample = %sample_scenes(&ids, 10),
                    "pending scenes"
                );
                pending.insert(lane.pool.clone(), ids);
            }
        }

        if pending.is_empty() {
            info!("nothing pending in any pool");
            self.finalize(base, &lanes, &mut summary).await;
            return Ok(summary);
        }

        debug!(phase = %RunPhase::Assign, pools = pending.len(), "opening sessions");
        self.ledger.update(base, LedgerTransition::Begin).await;
        let (sessions, unavailable) = self.open_sessions(&pending).await;
        let mut remaining: BTreeMap<String, Vec<SceneId>> = BTreeMap::new();
        for pool in unavailable {
            if let Some(ids) = pending.remove(&pool) {
                remaining.insert(pool.clone(), ids);
            }
            summary.unavailable_pools.push(pool);
        }

        let supervisors = self.build_supervisors(base, &lanes, &sessions);
        self.drive_rounds(base, &supervisors, pending, &mut remaining, &mut summary)
            .await;
        self.close_sessions(sessions).await;

        self.finalize(base, &lanes, &mut summary).await;
        report_failures(&summary);
        Ok(summary)
    }

    fn build_lanes(&self, base: &str) -> Result<Vec<Lane>, SchedulerError> {
        let available = self.backend.available_pools();
        let mut lanes = Vec::new();
        for pool in self.catalog.pools(base)? {
            if let Some(known) = &available {
                if !known.contains(&pool) {
                    warn!(pool = %pool, "pool not offered by the render backend, ignoring");
                    continue;
                }
            }
            let scenes = self.catalog.scenes_for_pool(base, &pool)?;
            if scenes.is_empty() {
                continue;
            }
            lanes.push(Lane {
                pool,
                scenes: Arc::new(scenes),
            });
        }
        if lanes.is_empty() {
            return Err(SchedulerError::EmptyCatalog(base.to_string()));
        }
        Ok(lanes)
    }

    async fn open_sessions(
        &self,
        pending: &BTreeMap<String, Vec<SceneId>>,
    ) -> (BTreeMap<String, Arc<dyn RenderSession>>, Vec<String>) {
        let mut sessions = BTreeMap::new();
        let mut unavailable = Vec::new();
        for (idx, pool) in pending.keys().enumerate() {
            if idx > 0 && !self.settings.pool_open_stagger.is_zero() {
                tokio::time::sleep(self.settings.pool_open_stagger).await;
            }
            match self.backend.open_session(pool).await {
                Ok(session) => {
                    sessions.insert(pool.clone(), session);
                }
                Err(e) => {
                    error!(pool = %pool, error = %e, "session unavailable, skipping pool");
                    unavailable.push(pool.clone());
                }
            }
        }
        (sessions, unavailable)
    }

    async fn close_sessions(&self, sessions: BTreeMap<String, Arc<dyn RenderSession>>) {
        for (pool, session) in sessions {
            if let Err(e) = session.close().await {
                warn!(pool = %pool, error = %e, "failed to close session");
            }
        }
    }

    fn build_supervisors(
        &self,
        base: &str,
        lanes: &[Lane],
        sessions: &BTreeMap<String, Arc<dyn RenderSession>>,
    ) -> BTreeMap<String, PoolSupervisor> {
        lanes
            .iter()
            .filter_map(|lane| {
                let session = sessions.get(&lane.pool)?;
                let ctx = WorkerContext {
                    base: base.to_string(),
                    pool: lane.pool.clone(),
                    scenes: Arc::clone(&lane.scenes),
                    session: Arc::clone(session),
                    store: Arc::clone(&self.store),
                    oracle: Arc::clone(&self.oracle),
                    ledger: Arc::clone(&self.ledger),
                    render_timeout: self.settings.render_timeout,
                };
                let supervisor = PoolSupervisor::new(
                    Arc::new(ctx),
                    self.settings.workers_per_pool,
                    self.progress.clone(),
                );
                Some((lane.pool.clone(), supervisor))
            })
            .collect()
    }

    /// Initial dispatch followed by retry rounds. Pools without a supervisor keep
    /// their entry in `remaining` but are never retried in this run.
    async fn drive_rounds(
        &self,
        base: &str,
        supervisors: &BTreeMap<String, PoolSupervisor>,
        initial: BTreeMap<String, Vec<SceneId>>,
        remaining: &mut BTreeMap<String, Vec<SceneId>>,
        summary: &mut RunSummary,
    ) {
        let mut batches = initial;
        loop {
            debug!(
                phase = %RunPhase::Dispatch,
                round = summary.rounds.len(),
                pools = batches.len(),
                "dispatching"
            );
            summary.rounds.push(batches.clone());
            let settled = self.dispatch(supervisors, batches).await;

            debug!(phase = %RunPhase::Settle, "collecting remainders");
            for (pool, report) in settled {
                summary.rendered += report.rendered;
                if !report.failures.is_empty() {
                    summary
                        .failures
                        .entry(pool.clone())
                        .or_default()
                        .extend(report.failures);
                }
                if report.remainder.is_empty() {
                    remaining.remove(&pool);
                } else {
                    remaining.insert(pool, report.remainder);
                }
            }

            debug!(phase = %RunPhase::RetryDecision, "consulting retry policy");
            let mut retry = BTreeMap::new();
            for (pool, ids) in remaining.iter() {
                if !supervisors.contains_key(pool) {
                    continue;
                }
                let unresolved = self.oracle.pending(base, ids);
                if unresolved.is_empty() {
                    continue;
                }
                if self.retry.should_retry(base, pool, &unresolved).await {
                    retry.insert(pool.clone(), unresolved);
                }
            }
            if retry.is_empty() {
                break;
            }
            summary.retry_rounds += 1;
            info!(round = summary.retry_rounds, pools = retry.len(), "starting retry round");
            batches = retry;
        }
    }

    /// Run every batch's supervisor concurrently and wait for all of them.
    ///
    /// A supervisor that errors or panics has its whole batch reported as remaining.
    async fn dispatch(
        &self,
        supervisors: &BTreeMap<String, PoolSupervisor>,
        batches: BTreeMap<String, Vec<SceneId>>,
    ) -> Vec<(String, PoolReport)> {
        let mut pools = Vec::with_capacity(batches.len());
        let mut handles = Vec::with_capacity(batches.len());
        for (pool, batch) in batches {
            let Some(supervisor) = supervisors.get(&pool).cloned() else {
                continue;
            };
            let task_batch = batch.clone();
            handles.push(tokio::spawn(async move { supervisor.run(&task_batch).await }));
            pools.push((pool, batch));
        }

        let results = join_all(handles).await;
        pools
            .into_iter()
            .zip(results)
            .map(|((pool, batch), result)| {
                let report = match result {
                    Ok(Ok(report)) => report,
                    Ok(Err(e)) => {
                        error!(pool = %pool, error = %e, "supervisor failed");
                        conservative_report(&pool, batch)
                    }
                    Err(e) => {
                        error!(pool = %pool, error = %e, "supervisor task aborted");
                        conservative_report(&pool, batch)
                    }
                };
                (pool, report)
            })
            .collect()
    }

    async fn finalize(&self, base: &str, lanes: &[Lane], summary: &mut RunSummary) {
        debug!(phase = %RunPhase::Finalize, "recomputing completion");
        let all_ids: BTreeSet<SceneId> = lanes
            .iter()
            .flat_map(|lane| lane.scenes.keys().copied())
            .collect();
        let all_ids: Vec<SceneId> = all_ids.into_iter().collect();
        let max_id = all_ids.last().copied().unwrap_or(0);

        summary.remaining = lanes
            .iter()
            .filter_map(|lane| {
                let left = self.oracle.pending(base, &lane.scene_ids());
                (!left.is_empty()).then(|| (lane.pool.clone(), left))
            })
            .collect();

        let entry = if summary.remaining.is_empty() {
            info!(watermark = max_id, "base complete");
            self.ledger
                .update(base, LedgerTransition::Complete { watermark: max_id })
                .await
        } else {
            let highest = self.oracle.highest_complete(base, &all_ids).unwrap_or(0);
            let missing: usize = summary.remaining.values().map(Vec::len).sum();
            info!(missing = missing, watermark = highest, "base partially complete");
            self.ledger
                .update(base, LedgerTransition::Suspend { watermark: highest })
                .await
        };
        summary.status = entry.status;
        summary.watermark = entry.watermark;
    }
}

fn conservative_report(pool: &str, batch: Vec<SceneId>) -> PoolReport {
    PoolReport {
        pool: pool.to_string(),
        remainder: batch,
        ..PoolReport::default()
    }
}

fn report_failures(summary: &RunSummary) {
    let total = summary.failure_count();
    if total == 0 {
        return;
    }
    for (pool, scenes) in &summary.failures {
        warn!(
            pool = %pool,
            failed = scenes.len(),
            sample = %sample_scenes(scenes, 5),
            "render failures"
        );
    }
    warn!(total = total, "base finished with render failures");
}
