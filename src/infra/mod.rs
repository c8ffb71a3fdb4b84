//! Infrastructure adapters: artifact stores, ledger stores and job catalogs.

pub mod catalog;
pub mod ledger;
pub mod store;

pub use catalog::{InMemoryCatalog, SuggestionFileCatalog};
pub use ledger::{InMemoryLedgerStore, ManifestLedgerStore};
pub use store::{FsArtifactStore, InMemoryArtifactStore};
