//! FIFO work queue for one pool.
//!
//! The queue is pre-loaded with a pool's backlog and shared by all of that pool's
//! workers. Each item is received by exactly one worker. Once every backlog item has
//! been acknowledged ([`WorkQueue::join`]), the supervisor seals the queue with one
//! sentinel per worker so each worker observes exactly one stop signal.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use flume::{Receiver, Sender, TrySendError};
use tokio::sync::Notify;
use tracing::warn;

use crate::core::SchedulerError;
use crate::util::serde::SceneId;

/// An item delivered to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueItem {
    /// A scene to render.
    Scene(SceneId),
    /// Stop signal; the worker acknowledges and terminates.
    Sentinel,
}

/// Snapshot of queue delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Scenes loaded at construction.
    pub enqueued: u64,
    /// Scenes handed to workers.
    pub delivered_items: u64,
    /// Sentinels handed to workers.
    pub delivered_sentinels: u64,
    /// Sentinels appended by [`WorkQueue::seal`].
    pub sealed_sentinels: u64,
    /// Acknowledgements received with nothing outstanding.
    pub extra_acks: u64,
}

#[derive(Debug, Default)]
struct QueueCounters {
    enqueued: AtomicU64,
    delivered_items: AtomicU64,
    delivered_sentinels: AtomicU64,
    sealed_sentinels: AtomicU64,
    extra_acks: AtomicU64,
}

impl QueueCounters {
    fn snapshot(&self) -> QueueStats {
        QueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered_items: self.delivered_items.load(Ordering::Relaxed),
            delivered_sentinels: self.delivered_sentinels.load(Ordering::Relaxed),
            sealed_sentinels: self.sealed_sentinels.load(Ordering::Relaxed),
            extra_acks: self.extra_acks.load(Ordering::Relaxed),
        }
    }
}

/// Single-pool FIFO of scene ids terminated by sentinels.
pub struct WorkQueue {
    pool: String,
    tx: Sender<QueueItem>,
    rx: Receiver<QueueItem>,
    /// Scenes delivered or waiting that have not been acknowledged yet.
    outstanding: AtomicUsize,
    drained: Notify,
    counters: QueueCounters,
}

impl WorkQueue {
    /// Build a queue holding `backlog` in order, with room for `workers` sentinels.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Config` if `workers` is zero.
    pub fn new(
        pool: impl Into<String>,
        backlog: &[SceneId],
        workers: usize,
    ) -> Result<Self, SchedulerError> {
        let pool = pool.into();
        if workers == 0 {
            return Err(SchedulerError::Config(format!(
                "pool `{pool}` needs at least one worker"
            )));
        }
        let (tx, rx) = flume::bounded(backlog.len() + workers);
        let queue = Self {
            pool,
            tx,
            rx,
            outstanding: AtomicUsize::new(0),
            drained: Notify::new(),
            counters: QueueCounters::default(),
        };
        for scene in backlog {
            queue.put(QueueItem::Scene(*scene))?;
            queue.outstanding.fetch_add(1, Ordering::AcqRel);
            queue.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        }
        Ok(queue)
    }

    fn put(&self, item: QueueItem) -> Result<(), SchedulerError> {
        self.tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => {
                SchedulerError::Supervisor {
                    pool: self.pool.clone(),
                    reason: "work queue over capacity".into(),
                }
            }
            TrySendError::Disconnected(_) => SchedulerError::Supervisor {
                pool: self.pool.clone(),
                reason: "work queue closed".into(),
            },
        })
    }

    /// Wait for the next item. Returns `None` only if the queue was torn down.
    pub async fn acquire(&self) -> Option<QueueItem> {
        let item = self.rx.recv_async().await.ok()?;
        match item {
            QueueItem::Scene(_) => self.counters.delivered_items.fetch_add(1, Ordering::Relaxed),
            QueueItem::Sentinel => self
                .counters
                .delivered_sentinels
                .fetch_add(1, Ordering::Relaxed),
        };
        Some(item)
    }

    /// Acknowledge one processed scene.
    ///
    /// An acknowledgement with nothing outstanding is a caller bug; it is logged and
    /// otherwise ignored.
    pub fn task_done(&self) {
        match self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(1) => self.drained.notify_waiters(),
            Ok(_) => {}
            Err(_) => {
                self.counters.extra_acks.fetch_add(1, Ordering::Relaxed);
                warn!(pool = %self.pool, "task_done called with no outstanding scene");
            }
        }
    }

    /// Guard acknowledging one scene when dropped, including during a panic unwind.
    #[must_use]
    pub const fn done_guard(&self) -> TaskDoneGuard<'_> {
        TaskDoneGuard { queue: self }
    }

    /// Wait until every backlog scene has been acknowledged.
    pub async fn join(&self) {
        loop {
            let notified = self.drained.notified();
            if self.outstanding.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Append one sentinel per worker.
    ///
    /// # Errors
    ///
    /// Fails if the queue cannot take the sentinels.
    pub fn seal(&self, workers: usize) -> Result<(), SchedulerError> {
        for _ in 0..workers {
            self.put(QueueItem::Sentinel)?;
            self.counters.sealed_sentinels.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Pool this queue belongs to.
    pub fn pool(&self) -> &str {
        &self.pool
    }

    /// Items currently waiting in the channel.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no items are waiting.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Delivery counters.
    pub fn stats(&self) -> QueueStats {
        self.counters.snapshot()
    }
}

/// Acknowledges a scene on drop. See [`WorkQueue::done_guard`].
pub struct TaskDoneGuard<'a> {
    queue: &'a WorkQueue,
}

impl Drop for TaskDoneGuard<'_> {
    fn drop(&mut self) {
        self.queue.task_done();
    }
}
