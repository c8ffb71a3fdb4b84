//! Small helpers shared across the crate: scene ids, clocks, tracing setup.

pub mod clock;
pub mod serde;
pub mod telemetry;

pub use clock::{now_ms, timestamp, TIMESTAMP_FORMAT};
pub use serde::{sample_scenes, scene_label, ArtifactPayload, SceneId, SceneMap};
pub use telemetry::{init_tracing, init_tracing_with, DEFAULT_LOG_FILTER};
