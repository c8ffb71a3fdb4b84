//! Wall-clock helpers shared by the ledger and progress sinks.

use std::time::{SystemTime, UNIX_EPOCH};

/// Format used for ledger `last_update` stamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Milliseconds since the Unix epoch, saturating to zero if the clock is before it.
#[must_use]
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Local wall-clock timestamp in [`TIMESTAMP_FORMAT`].
#[must_use]
pub fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}
