//! # Render Lanes
//!
//! A resumable, multi-pool scheduler for batch scene rendering.
//!
//! A *base* (one story, document or project) owns a set of numbered scenes split
//! across named *pools*. Each pool renders through its own long-lived session, and
//! every pool runs concurrently with a small, fixed number of workers. Runs can be
//! interrupted at any point: the next run asks the completion oracle which artifacts
//! already exist and only renders what is missing.
//!
//! ## Pieces
//!
//! - **Completion oracle**: artifact existence is the single source of truth for
//!   "is this scene done". Nothing else is consulted when scheduling.
//! - **Work queue and workers**: one FIFO per pool, drained by N workers and
//!   terminated by exactly one sentinel per worker.
//! - **Pool supervisor**: runs one batch for one pool and reports the scenes the
//!   oracle still considers incomplete.
//! - **Coordinator**: opens sessions, runs supervisors concurrently, offers retry
//!   rounds per pool and finalizes the ledger.
//! - **Progress ledger**: a durable per-base status and watermark, updated under a
//!   single lock with monotonic merges.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use render_lanes::builders::CoordinatorBuilder;
//! use render_lanes::config::SchedulerConfig;
//!
//! let config = SchedulerConfig::from_env()?;
//! let coordinator = CoordinatorBuilder::filesystem(config, Arc::new(my_backend)).build()?;
//! let summary = coordinator.run_base("chapter-01").await?;
//! println!("{} -> {} (watermark {})", summary.base, summary.status, summary.watermark);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: queue, workers, supervisors, coordinator, ledger.
pub mod core;
/// Configuration models and environment loading.
pub mod config;
/// Builders to construct a coordinator from configuration.
pub mod builders;
/// Infrastructure adapters for artifacts, ledger and catalog storage.
pub mod infra;
/// Runtime entry points for multi-base runs.
pub mod runtime;
/// Shared utilities.
pub mod util;
