//! Job catalog abstraction: which scenes each pool owns for a base.

use crate::core::SchedulerError;
use crate::util::serde::SceneMap;

/// Source of per-pool scene prompts.
pub trait JobCatalog: Send + Sync + 'static {
    /// Pools that own scenes for `base`, in a stable order.
    fn pools(&self, base: &str) -> Result<Vec<String>, SchedulerError>;

    /// Ordered scene id to prompt mapping for one pool of `base`.
    fn scenes_for_pool(&self, base: &str, pool: &str) -> Result<SceneMap, SchedulerError>;

    /// Bases this catalog knows about. Used to discover work not yet in the ledger.
    fn bases(&self) -> Result<Vec<String>, SchedulerError> {
        Ok(Vec::new())
    }
}
