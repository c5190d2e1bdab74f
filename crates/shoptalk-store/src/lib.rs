//! shoptalk-store
//!
//! `CorpusStore` implementations: the LanceDB-backed persistent store used
//! in production and an in-memory double for tests and development.

pub mod lance;
pub mod memory;
pub mod schema;

pub use lance::LanceStore;
pub use memory::MemoryStore;
