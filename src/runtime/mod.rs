//! Runtime entry points for driving whole runs.

pub mod api;

pub use api::{pending_bases, run_bases, run_pending, BaseReport};
