//! shoptalk-hybrid
//!
//! The hybrid retriever: semantic + lexical retrieval across notes and
//! manual chunks, score fusion by document identity, and a confidence gate
//! that reports "no reliable answer" instead of returning weak hits.

pub mod fusion;
pub mod retriever;

pub use retriever::{HybridRetriever, RetrievalParams};
