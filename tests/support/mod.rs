//! Scripted render backend and fixtures shared by integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use render_lanes::builders::CoordinatorBuilder;
use render_lanes::config::SchedulerConfig;
use render_lanes::core::{
    Coordinator, RenderBackend, RenderRequest, RenderSession, SchedulerError,
};
use render_lanes::infra::{InMemoryArtifactStore, InMemoryCatalog, InMemoryLedgerStore};
use render_lanes::util::serde::{ArtifactPayload, SceneId};
use render_lanes::util::telemetry::init_tracing;

/// How a scene misbehaves.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Fail the first `n` attempts with an error.
    FailTimes(usize),
    /// Return no artifacts for the first `n` attempts.
    EmptyTimes(usize),
    /// Fail every attempt.
    Always,
    /// Sleep before the first attempt returns.
    SlowOnce(Duration),
}

#[derive(Default)]
struct Script {
    faults: HashMap<SceneId, Fault>,
    attempts: HashMap<SceneId, usize>,
    calls: Vec<(String, SceneId)>,
    in_flight: HashSet<SceneId>,
    in_flight_per_pool: HashMap<String, usize>,
    max_in_flight_per_pool: HashMap<String, usize>,
    duplicate_in_flight: bool,
    opened: Vec<String>,
    closed: Vec<String>,
}

/// Render backend whose behaviour is scripted per scene.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
    broken_pools: Arc<HashSet<String>>,
    available: Option<Vec<String>>,
    delay: Duration,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fault(self, scene: SceneId, fault: Fault) -> Self {
        self.script.lock().faults.insert(scene, fault);
        self
    }

    pub fn with_broken_pool(mut self, pool: &str) -> Self {
        let mut broken: HashSet<String> = (*self.broken_pools).clone();
        broken.insert(pool.to_string());
        self.broken_pools = Arc::new(broken);
        self
    }

    pub fn with_available(mut self, pools: &[&str]) -> Self {
        self.available = Some(pools.iter().map(|p| (*p).to_string()).collect());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every render call as `(pool, scene)`, in call order.
    pub fn calls(&self) -> Vec<(String, SceneId)> {
        self.script.lock().calls.clone()
    }

    pub fn attempts(&self, scene: SceneId) -> usize {
        self.script.lock().attempts.get(&scene).copied().unwrap_or(0)
    }

    pub fn opened(&self) -> Vec<String> {
        self.script.lock().opened.clone()
    }

    pub fn closed(&self) -> Vec<String> {
        self.script.lock().closed.clone()
    }

    pub fn max_in_flight(&self, pool: &str) -> usize {
        self.script
            .lock()
            .max_in_flight_per_pool
            .get(pool)
            .copied()
            .unwrap_or(0)
    }

    /// Whether a scene was ever rendered twice at the same time.
    pub fn saw_duplicate_in_flight(&self) -> bool {
        self.script.lock().duplicate_in_flight
    }
}

struct ScriptedSession {
    pool: String,
    backend: ScriptedBackend,
}

enum Planned {
    Ok,
    Fail,
    Empty,
    Sleep(Duration),
}

#[async_trait]
impl RenderSession for ScriptedSession {
    async fn render(
        &self,
        req: RenderRequest<'_>,
    ) -> Result<Vec<ArtifactPayload>, SchedulerError> {
        let scene = req.scene;
        let planned = {
            let mut script = self.backend.script.lock();
            script.calls.push((self.pool.clone(), scene));
            if !script.in_flight.insert(scene) {
                script.duplicate_in_flight = true;
            }
            let running = {
                let n = script.in_flight_per_pool.entry(self.pool.clone()).or_default();
                *n += 1;
                *n
            };
            let peak = script
                .max_in_flight_per_pool
                .entry(self.pool.clone())
                .or_default();
            *peak = (*peak).max(running);

            let attempt = {
                let n = script.attempts.entry(scene).or_default();
                *n += 1;
                *n
            };
            match script.faults.get(&scene) {
                Some(Fault::FailTimes(n)) if attempt <= *n => Planned::Fail,
                Some(Fault::EmptyTimes(n)) if attempt <= *n => Planned::Empty,
                Some(Fault::Always) => Planned::Fail,
                Some(Fault::SlowOnce(d)) if attempt == 1 => Planned::Sleep(*d),
                _ => Planned::Ok,
            }
        };

        let _release = InFlight {
            backend: &self.backend,
            pool: &self.pool,
            scene,
        };
        if !self.backend.delay.is_zero() {
            tokio::time::sleep(self.backend.delay).await;
        }
        match planned {
            Planned::Fail => Err(SchedulerError::Render {
                scene,
                reason: "scripted failure".into(),
            }),
            Planned::Empty => Ok(Vec::new()),
            Planned::Sleep(d) => {
                tokio::time::sleep(d).await;
                Ok(vec![ArtifactPayload::new(req.prompt.as_bytes())])
            }
            Planned::Ok => Ok(vec![
                ArtifactPayload::new(req.prompt.as_bytes()),
                ArtifactPayload::new(b"preview".to_vec()),
            ]),
        }
    }

    async fn close(&self) -> Result<(), SchedulerError> {
        self.backend.script.lock().closed.push(self.pool.clone());
        Ok(())
    }
}

struct InFlight<'a> {
    backend: &'a ScriptedBackend,
    pool: &'a str,
    scene: SceneId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut script = self.backend.script.lock();
        script.in_flight.remove(&self.scene);
        if let Some(n) = script.in_flight_per_pool.get_mut(self.pool) {
            *n = n.saturating_sub(1);
        }
    }
}

#[async_trait]
impl RenderBackend for ScriptedBackend {
    fn available_pools(&self) -> Option<Vec<String>> {
        self.available.clone()
    }

    async fn open_session(&self, pool: &str) -> Result<Arc<dyn RenderSession>, SchedulerError> {
        if self.broken_pools.contains(pool) {
            return Err(SchedulerError::SessionUnavailable {
                pool: pool.to_string(),
                reason: "login wall".into(),
            });
        }
        self.script.lock().opened.push(pool.to_string());
        Ok(Arc::new(ScriptedSession {
            pool: pool.to_string(),
            backend: self.clone(),
        }))
    }
}

/// Everything a scenario needs to inspect after a run.
pub struct Harness {
    pub coordinator: Coordinator,
    pub backend: ScriptedBackend,
    pub store: Arc<InMemoryArtifactStore>,
    pub ledger: Arc<InMemoryLedgerStore>,
}

/// Fast config: no session stagger, two workers per pool. Also installs the log
/// subscriber so `RUST_LOG=debug` shows scheduler traces.
pub fn test_config(max_retry_rounds: Option<u32>) -> SchedulerConfig {
    init_tracing();
    SchedulerConfig {
        pool_open_stagger_ms: 0,
        max_retry_rounds,
        ..SchedulerConfig::default()
    }
}

/// The two-pool catalog used by most scenarios: A owns 1..=3, B owns 4..=5.
pub fn two_pool_catalog(base: &str) -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_pool(base, "A", [1, 2, 3])
        .with_pool(base, "B", [4, 5])
}

pub fn harness(
    config: SchedulerConfig,
    catalog: InMemoryCatalog,
    backend: ScriptedBackend,
    store: Arc<InMemoryArtifactStore>,
) -> Harness {
    let ledger = Arc::new(InMemoryLedgerStore::new());
    let coordinator = CoordinatorBuilder::new(config)
        .catalog(Arc::new(catalog))
        .backend(Arc::new(backend.clone()))
        .artifact_store(store.clone())
        .ledger_store(ledger.clone())
        .build()
        .expect("coordinator builds");
    Harness {
        coordinator,
        backend,
        store,
        ledger,
    }
}
