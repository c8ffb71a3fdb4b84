//! Application-facing entry points: base discovery and multi-base runs.

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::builders::CoordinatorBuilder;
use crate::config::SchedulerConfig;
use crate::core::{
    AppResult, Coordinator, JobCatalog, LedgerStatus, RenderBackend, RunSummary, SchedulerError,
};
use crate::infra::{ManifestLedgerStore, SuggestionFileCatalog};
use crate::util::serde::SceneId;

/// Serializable outcome of one base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseReport {
    /// Base identifier.
    pub base: String,
    /// Final ledger status, absent if the run aborted.
    pub status: Option<LedgerStatus>,
    /// Final ledger watermark.
    pub watermark: SceneId,
    /// Successful jobs.
    pub rendered: usize,
    /// Scenes still incomplete.
    pub remaining: usize,
    /// Retry rounds executed.
    pub retry_rounds: u32,
    /// Abort reason, if the run did not reach finalize.
    pub error: Option<String>,
}

impl BaseReport {
    /// Report for a finished run.
    pub fn from_summary(summary: &RunSummary) -> Self {
        Self {
            base: summary.base.clone(),
            status: Some(summary.status),
            watermark: summary.watermark,
            rendered: summary.rendered,
            remaining: summary.remaining.values().map(Vec::len).sum(),
            retry_rounds: summary.retry_rounds,
            error: None,
        }
    }

    /// Report for an aborted run.
    pub fn aborted(base: &str, err: &SchedulerError) -> Self {
        Self {
            base: base.to_string(),
            status: None,
            watermark: 0,
            rendered: 0,
            remaining: 0,
            retry_rounds: 0,
            error: Some(err.to_string()),
        }
    }
}

/// Run `bases` one after another. A base that aborts does not stop the others.
pub async fn run_bases(
    coordinator: &Coordinator,
    bases: &[String],
) -> Vec<(String, Result<RunSummary, SchedulerError>)> {
    let mut results = Vec::with_capacity(bases.len());
    for (idx, base) in bases.iter().enumerate() {
        info!(base = %base, position = idx + 1, total = bases.len(), "starting base");
        let result = coordinator.run_base(base).await;
        if let Err(e) = &result {
            error!(base = %base, error = %e, "base aborted");
        }
        results.push((base.clone(), result));
    }
    results
}

/// Bases with image work pending according to the manifest and the catalog.
pub fn pending_bases(
    manifest: &ManifestLedgerStore,
    catalog: &dyn JobCatalog,
) -> Result<Vec<String>, SchedulerError> {
    let known = catalog.bases()?;
    manifest.pending_bases(&known)
}

/// Run every pending base with the filesystem adapters described by `config`.
///
/// # Errors
///
/// Fails if the configuration is invalid or pending bases cannot be listed.
pub async fn run_pending(
    config: SchedulerConfig,
    backend: Arc<dyn RenderBackend>,
) -> AppResult<Vec<BaseReport>> {
    let manifest = ManifestLedgerStore::new(&config.manifest_path);
    let catalog = SuggestionFileCatalog::new(&config.suggestions_dir);
    let bases = pending_bases(&manifest, &catalog).context("listing pending bases")?;
    if bases.is_empty() {
        info!("no pending bases");
        return Ok(Vec::new());
    }

    let coordinator = CoordinatorBuilder::filesystem(config, backend)
        .build()
        .context("building coordinator")?;
    let reports = run_bases(&coordinator, &bases)
        .await
        .iter()
        .map(|(base, result)| match result {
            Ok(summary) => BaseReport::from_summary(summary),
            Err(e) => BaseReport::aborted(base, e),
        })
        .collect();
    Ok(reports)
}
