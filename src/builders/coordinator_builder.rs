//! Builder assembling a [`Coordinator`] from configuration and collaborators.

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::core::{
    AlwaysRetry, ArtifactStore, CompletionOracle, Coordinator, JobCatalog, LedgerStore,
    MaxRounds, NeverRetry, ProgressLedger, RenderBackend, RetryPolicy, SchedulerError,
    SharedProgressSink, StoreOracle,
};
use crate::infra::{FsArtifactStore, ManifestLedgerStore, SuggestionFileCatalog};

/// Fluent builder for [`Coordinator`].
///
/// Catalog, backend, artifact store and ledger store are required. The oracle
/// defaults to a [`StoreOracle`] over the artifact store and the retry policy is
/// derived from [`SchedulerConfig::max_retry_rounds`].
pub struct CoordinatorBuilder {
    config: SchedulerConfig,
    catalog: Option<Arc<dyn JobCatalog>>,
    backend: Option<Arc<dyn RenderBackend>>,
    store: Option<Arc<dyn ArtifactStore>>,
    oracle: Option<Arc<dyn CompletionOracle>>,
    ledger: Option<Arc<ProgressLedger>>,
    retry: Option<Arc<dyn RetryPolicy>>,
    progress: Option<SharedProgressSink>,
}

impl CoordinatorBuilder {
    /// Start from a configuration.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            catalog: None,
            backend: None,
            store: None,
            oracle: None,
            ledger: None,
            retry: None,
            progress: None,
        }
    }

    /// Builder wired to the filesystem adapters named by `config`: suggestion files,
    /// the artifact output tree and the manifest ledger.
    pub fn filesystem(config: SchedulerConfig, backend: Arc<dyn RenderBackend>) -> Self {
        let catalog: Arc<dyn JobCatalog> =
            Arc::new(SuggestionFileCatalog::new(&config.suggestions_dir));
        let store: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(
            &config.output_dir,
            config.variants_per_scene,
        ));
        let ledger: Arc<dyn LedgerStore> = Arc::new(ManifestLedgerStore::new(&config.manifest_path));
        Self::new(config)
            .catalog(catalog)
            .backend(backend)
            .artifact_store(store)
            .ledger_store(ledger)
    }

    /// Configuration in use.
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Job catalog.
    #[must_use]
    pub fn catalog(mut self, catalog: Arc<dyn JobCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Render backend.
    #[must_use]
    pub fn backend(mut self, backend: Arc<dyn RenderBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Artifact store.
    #[must_use]
    pub fn artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the completion oracle.
    #[must_use]
    pub fn oracle(mut self, oracle: Arc<dyn CompletionOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Ledger store, wrapped in a fresh [`ProgressLedger`].
    #[must_use]
    pub fn ledger_store(mut self, store: Arc<dyn LedgerStore>) -> Self {
        self.ledger = Some(Arc::new(ProgressLedger::new(store)));
        self
    }

    /// Share an existing ledger (and its cache) with other coordinators.
    #[must_use]
    pub fn ledger(mut self, ledger: Arc<ProgressLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Override the retry policy.
    #[must_use]
    pub fn retry_policy(mut self, retry: Arc<dyn RetryPolicy>) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Progress sink.
    #[must_use]
    pub fn progress_sink(mut self, sink: SharedProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Retry policy implied by `max_retry_rounds`.
    pub fn default_retry_policy(config: &SchedulerConfig) -> Arc<dyn RetryPolicy> {
        match config.max_retry_rounds {
            None => Arc::new(AlwaysRetry),
            Some(0) => Arc::new(NeverRetry),
            Some(n) => Arc::new(MaxRounds::new(n)),
        }
    }

    /// Validate the configuration and assemble the coordinator.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Config` if the configuration is invalid or a required
    /// collaborator is missing.
    pub fn build(self) -> Result<Coordinator, SchedulerError> {
        self.config
            .validate()
            .map_err(|e| SchedulerError::Config(format!("config invalid: {e}")))?;

        let catalog = self.catalog.ok_or_else(|| missing("catalog"))?;
        let backend = self.backend.ok_or_else(|| missing("render backend"))?;
        let store = self.store.ok_or_else(|| missing("artifact store"))?;
        let ledger = self.ledger.ok_or_else(|| missing("ledger store"))?;
        let oracle: Arc<dyn CompletionOracle> = match self.oracle {
            Some(oracle) => oracle,
            None => Arc::new(StoreOracle::new(Arc::clone(&store))),
        };
        let retry = self
            .retry
            .unwrap_or_else(|| Self::default_retry_policy(&self.config));

        Ok(Coordinator::new(
            catalog,
            backend,
            store,
            oracle,
            ledger,
            retry,
            self.progress,
            self.config.coordinator_settings(),
        ))
    }
}

fn missing(what: &str) -> SchedulerError {
    SchedulerError::Config(format!("coordinator builder is missing a {what}"))
}
