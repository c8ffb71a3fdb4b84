//! Scheduler configuration structures.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::CoordinatorSettings;

/// Upper bound on workers per pool.
pub const MAX_WORKERS_PER_POOL: usize = 8;
/// Upper bound on artifact variants stored per scene.
pub const MAX_VARIANTS_PER_SCENE: usize = 4;
/// Prefix of environment variables read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "RENDER_LANES_";

const fn default_workers_per_pool() -> usize {
    2
}

const fn default_variants_per_scene() -> usize {
    1
}

const fn default_pool_open_stagger_ms() -> u64 {
    1000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output/imgs_output")
}

fn default_suggestions_dir() -> PathBuf {
    PathBuf::from("output/img_suggestions")
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("manifesto.json")
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Workers per pool batch.
    #[serde(default = "default_workers_per_pool")]
    pub workers_per_pool: usize,
    /// Artifact variants expected per scene.
    #[serde(default = "default_variants_per_scene")]
    pub variants_per_scene: usize,
    /// Retry rounds allowed per pool; `None` retries while anything remains.
    #[serde(default)]
    pub max_retry_rounds: Option<u32>,
    /// Pause between opening consecutive pool sessions, in milliseconds.
    #[serde(default = "default_pool_open_stagger_ms")]
    pub pool_open_stagger_ms: u64,
    /// Optional cap on a single render call, in seconds.
    #[serde(default)]
    pub render_timeout_secs: Option<u64>,
    /// Root directory for rendered artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Root directory of per-base suggestion files.
    #[serde(default = "default_suggestions_dir")]
    pub suggestions_dir: PathBuf,
    /// Shared manifest holding the ledger.
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers_per_pool: default_workers_per_pool(),
            variants_per_scene: default_variants_per_scene(),
            max_retry_rounds: None,
            pool_open_stagger_ms: default_pool_open_stagger_ms(),
            render_timeout_secs: None,
            output_dir: default_output_dir(),
            suggestions_dir: default_suggestions_dir(),
            manifest_path: default_manifest_path(),
        }
    }
}

impl SchedulerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.workers_per_pool == 0 || self.workers_per_pool > MAX_WORKERS_PER_POOL {
            return Err(format!(
                "workers_per_pool must be between 1 and {MAX_WORKERS_PER_POOL}"
            ));
        }
        if self.variants_per_scene == 0 || self.variants_per_scene > MAX_VARIANTS_PER_SCENE {
            return Err(format!(
                "variants_per_scene must be between 1 and {MAX_VARIANTS_PER_SCENE}"
            ));
        }
        if self.render_timeout_secs == Some(0) {
            return Err("render_timeout_secs must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the environment, loading a `.env` file first if present.
    ///
    /// Recognized variables (all optional): `RENDER_LANES_WORKERS_PER_POOL`,
    /// `RENDER_LANES_VARIANTS_PER_SCENE`, `RENDER_LANES_MAX_RETRY_ROUNDS`,
    /// `RENDER_LANES_POOL_OPEN_STAGGER_MS`, `RENDER_LANES_RENDER_TIMEOUT_SECS`,
    /// `RENDER_LANES_OUTPUT_DIR`, `RENDER_LANES_SUGGESTIONS_DIR`,
    /// `RENDER_LANES_MANIFEST_PATH`.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (keys include [`ENV_PREFIX`]).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut cfg = Self::default();
        if let Some(v) = get("WORKERS_PER_POOL") {
            cfg.workers_per_pool = parse_var("WORKERS_PER_POOL", &v)?;
        }
        if let Some(v) = get("VARIANTS_PER_SCENE") {
            cfg.variants_per_scene = parse_var("VARIANTS_PER_SCENE", &v)?;
        }
        if let Some(v) = get("MAX_RETRY_ROUNDS") {
            cfg.max_retry_rounds = Some(parse_var("MAX_RETRY_ROUNDS", &v)?);
        }
        if let Some(v) = get("POOL_OPEN_STAGGER_MS") {
            cfg.pool_open_stagger_ms = parse_var("POOL_OPEN_STAGGER_MS", &v)?;
        }
        if let Some(v) = get("RENDER_TIMEOUT_SECS") {
            cfg.render_timeout_secs = Some(parse_var("RENDER_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("OUTPUT_DIR") {
            cfg.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("SUGGESTIONS_DIR") {
            cfg.suggestions_dir = PathBuf::from(v);
        }
        if let Some(v) = get("MANIFEST_PATH") {
            cfg.manifest_path = PathBuf::from(v);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Coordinator tunables derived from this configuration.
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            workers_per_pool: self.workers_per_pool,
            pool_open_stagger: Duration::from_millis(self.pool_open_stagger_ms),
            render_timeout: self.render_timeout_secs.map(Duration::from_secs),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("{ENV_PREFIX}{name}: {e}"))
}
