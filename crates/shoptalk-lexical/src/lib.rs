//! shoptalk-lexical
//!
//! In-memory BM25 indexing over the current document set. Snapshots are
//! transient: built wholesale per scope at first use, replaced wholesale on
//! invalidation, never written to disk.

pub mod bm25;
pub mod manager;
pub mod snapshot;

pub use manager::IndexManager;
pub use snapshot::LexicalSnapshot;
