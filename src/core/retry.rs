//! Retry policies consulted between rounds.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::warn;

use crate::util::serde::{sample_scenes, SceneId};

/// Decides, per pool, whether its remainder gets another round.
///
/// The coordinator treats this as an opaque predicate. An interactive prompt is one
/// possible implementation; the scheduler has no notion of interactivity.
#[async_trait]
pub trait RetryPolicy: Send + Sync + 'static {
    /// Whether `pool` should retry the `remaining` scenes of `base`.
    async fn should_retry(&self, base: &str, pool: &str, remaining: &[SceneId]) -> bool;
}

/// Retry every pool for as long as anything remains.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysRetry;

#[async_trait]
impl RetryPolicy for AlwaysRetry {
    async fn should_retry(&self, base: &str, pool: &str, remaining: &[SceneId]) -> bool {
        warn!(
            base = base,
            pool = pool,
            failed = remaining.len(),
            sample = %sample_scenes(remaining, 5),
            "scenes failed, retrying automatically"
        );
        true
    }
}

/// Never retry; remainders are left for the next run.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverRetry;

#[async_trait]
impl RetryPolicy for NeverRetry {
    async fn should_retry(&self, _base: &str, _pool: &str, _remaining: &[SceneId]) -> bool {
        false
    }
}

/// Retry each (base, pool) at most `max_rounds` times.
#[derive(Debug)]
pub struct MaxRounds {
    max_rounds: u32,
    used: Mutex<HashMap<(String, String), u32>>,
}

impl MaxRounds {
    /// Allow up to `max_rounds` retries per pool and base.
    pub fn new(max_rounds: u32) -> Self {
        Self {
            max_rounds,
            used: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RetryPolicy for MaxRounds {
    async fn should_retry(&self, base: &str, pool: &str, remaining: &[SceneId]) -> bool {
        let mut used = self.used.lock();
        let rounds = used
            .entry((base.to_string(), pool.to_string()))
            .or_insert(0);
        if *rounds >= self.max_rounds {
            warn!(
                base = base,
                pool = pool,
                failed = remaining.len(),
                max_rounds = self.max_rounds,
                "retry budget exhausted"
            );
            return false;
        }
        *rounds += 1;
        warn!(
            base = base,
            pool = pool,
            failed = remaining.len(),
            sample = %sample_scenes(remaining, 5),
            round = *rounds,
            "scenes failed, retrying"
        );
        true
    }
}
