//! Core scheduling abstractions: queue, workers, supervisors, coordinator, ledger.

pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod oracle;
pub mod progress;
pub mod renderer;
pub mod retry;
pub mod supervisor;
pub mod work_queue;
pub mod worker;

pub use catalog::JobCatalog;
pub use coordinator::{Coordinator, CoordinatorSettings, RunPhase, RunSummary};
pub use error::{AppResult, SchedulerError};
pub use ledger::{LedgerEntry, LedgerStatus, LedgerStore, LedgerTransition, ProgressLedger};
pub use oracle::{ArtifactStore, CompletionOracle, StoreOracle};
pub use progress::{
    build_progress_event, shared_sink, InMemoryProgressHandle, InMemoryProgressSink,
    ProgressEvent, ProgressReporter, ProgressSink, SharedProgressSink, TaggedLineSink,
    TracingProgressSink,
};
pub use renderer::{RenderBackend, RenderRequest, RenderSession};
pub use retry::{AlwaysRetry, MaxRounds, NeverRetry, RetryPolicy};
pub use supervisor::{PoolReport, PoolSupervisor};
pub use work_queue::{QueueItem, QueueStats, TaskDoneGuard, WorkQueue};
pub use worker::{run_worker, JobOutcome, WorkerContext, WorkerReport};
