//! Ledger store backends.

pub mod manifest;
pub mod memory;

pub use manifest::ManifestLedgerStore;
pub use memory::InMemoryLedgerStore;
