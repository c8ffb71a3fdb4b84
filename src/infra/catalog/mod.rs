//! Job catalog backends.

pub mod memory;
pub mod suggestions;

pub use memory::InMemoryCatalog;
pub use suggestions::SuggestionFileCatalog;
