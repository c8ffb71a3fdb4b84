//! Configuration models for the scheduler.

pub mod scheduler;

pub use scheduler::{SchedulerConfig, ENV_PREFIX, MAX_VARIANTS_PER_SCENE, MAX_WORKERS_PER_POOL};
