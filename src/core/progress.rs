//! Progress events and sink implementations.
//!
//! Sinks are pure observers: nothing in the scheduler reads events back, and running
//! without a sink changes no scheduling decision.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::util::clock::now_ms;
use crate::util::serde::SceneId;

/// One completed job within a pool batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// Base unit of work.
    pub base: String,
    /// Pool that completed the job.
    pub pool: String,
    /// Scene that completed.
    pub scene: SceneId,
    /// Jobs completed so far in this batch.
    pub completed: usize,
    /// Jobs queued in this batch.
    pub total: usize,
    /// `completed / total * 100`, zero for an empty batch.
    pub percentage: f64,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
}

/// Progress sink abstraction.
pub trait ProgressSink: Send {
    /// Record a progress event.
    fn record(&mut self, event: ProgressEvent);
}

/// Sink shared by every worker of a run.
pub type SharedProgressSink = Arc<Mutex<Box<dyn ProgressSink>>>;

/// Wrap a sink for sharing across workers.
pub fn shared_sink(sink: impl ProgressSink + 'static) -> SharedProgressSink {
    Arc::new(Mutex::new(Box::new(sink)))
}

/// In-memory progress sink for testing and dev.
pub struct InMemoryProgressSink {
    events: Arc<Mutex<VecDeque<ProgressEvent>>>,
    max_events: usize,
}

impl InMemoryProgressSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// A handle observing the same buffer, usable after the sink is boxed.
    #[must_use]
    pub fn handle(&self) -> InMemoryProgressHandle {
        InMemoryProgressHandle {
            events: Arc::clone(&self.events),
        }
    }
}

/// Read side of an [`InMemoryProgressSink`].
#[derive(Clone)]
pub struct InMemoryProgressHandle {
    events: Arc<Mutex<VecDeque<ProgressEvent>>>,
}

impl InMemoryProgressHandle {
    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().iter().cloned().collect()
    }
}

impl ProgressSink for InMemoryProgressSink {
    fn record(&mut self, event: ProgressEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Sink that emits each event as a structured `tracing` record.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn record(&mut self, event: ProgressEvent) {
        tracing::info!(
            base = %event.base,
            pool = %event.pool,
            scene = event.scene,
            completed = event.completed,
            total = event.total,
            percentage = event.percentage,
            "progress"
        );
    }
}

/// Tag delimiting progress lines for an external UI parser.
pub const PROGRESS_TAG: &str = "<<PROGRESS>>";

#[derive(Serialize)]
struct TaggedLine<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    profile: &'a str,
    current: usize,
    total: usize,
    percentage: f64,
}

/// Sink writing `<<PROGRESS>>{json}<<PROGRESS>>` lines to a writer (stdout by default).
pub struct TaggedLineSink<W: Write + Send> {
    out: W,
}

impl TaggedLineSink<std::io::Stdout> {
    /// Sink writing to the process stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write + Send> TaggedLineSink<W> {
    /// Sink writing to an arbitrary writer.
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Consume the sink and return the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> ProgressSink for TaggedLineSink<W> {
    fn record(&mut self, event: ProgressEvent) {
        let line = TaggedLine {
            kind: "progress",
            profile: &event.pool,
            current: event.completed,
            total: event.total,
            percentage: event.percentage,
        };
        let Ok(json) = serde_json::to_string(&line) else {
            return;
        };
        // Progress output is best effort.
        let _ = writeln!(self.out, "\n{PROGRESS_TAG}{json}{PROGRESS_TAG}");
        let _ = self.out.flush();
    }
}

/// Per-batch completion counter feeding a shared sink.
pub struct ProgressReporter {
    base: String,
    pool: String,
    total: usize,
    completed: AtomicUsize,
    sink: Option<SharedProgressSink>,
}

impl ProgressReporter {
    /// Reporter for a batch of `total` jobs.
    pub fn new(
        base: impl Into<String>,
        pool: impl Into<String>,
        total: usize,
        sink: Option<SharedProgressSink>,
    ) -> Self {
        Self {
            base: base.into(),
            pool: pool.into(),
            total,
            completed: AtomicUsize::new(0),
            sink,
        }
    }

    /// Count one completed job and emit an event.
    pub fn job_completed(&self, scene: SceneId) {
        let completed = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        let Some(sink) = self.sink.as_ref() else {
            return;
        };
        let event = build_progress_event(&self.base, &self.pool, scene, completed, self.total);
        sink.lock().record(event);
    }

    /// Jobs completed so far.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    /// Jobs in the batch.
    pub const fn total(&self) -> usize {
        self.total
    }
}

/// Helper to build a progress event from counters.
#[must_use]
pub fn build_progress_event(
    base: &str,
    pool: &str,
    scene: SceneId,
    completed: usize,
    total: usize,
) -> ProgressEvent {
    #[allow(clippy::cast_precision_loss)]
    let percentage = if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    };
    ProgressEvent {
        base: base.to_string(),
        pool: pool.to_string(),
        scene,
        completed,
        total,
        percentage,
        created_at_ms: now_ms(),
    }
}
