use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::{
    Document, Machine, Manual, ManualChunk, Note, PageImage, ScoredDocument,
};

/// Deterministic text-to-vector provider.
///
/// Implementations load their model lazily on first use and must tolerate
/// empty or very short input (a degenerate vector is acceptable, an error is
/// not). A model that cannot be loaded is fatal to the dependent operation.
pub trait Embedder: Send + Sync {
    /// Embedding dimensionality; every returned vector has exactly this
    /// length.
    fn dim(&self) -> usize;
    /// Maximum input length in model tokens; longer input is truncated.
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| Error::provider("embedding", "empty batch result"))
    }
}

/// The persistence collaborator: notes and manual chunks with vector
/// columns, nearest-neighbor queries, and the machine/manual registry.
///
/// Scope filtering is applied inside the store so the semantic and lexical
/// retrieval paths see the same document set: a scoped query matches
/// documents tagged with that machine plus global notes; `None` matches
/// everything. An unknown scope simply matches nothing.
#[async_trait]
pub trait CorpusStore: Send + Sync {
    async fn register_machine(&self, machine: &Machine) -> Result<()>;
    async fn list_machines(&self) -> Result<Vec<Machine>>;
    async fn register_manual(&self, manual: &Manual) -> Result<()>;

    /// Insert a note and its embedding as a single atomic unit. A note
    /// without an embedding is excluded from semantic search but still
    /// served to the lexical index.
    async fn insert_note(&self, note: &Note, vector: Option<&[f32]>) -> Result<()>;
    async fn insert_chunk(&self, chunk: &ManualChunk, vector: Option<&[f32]>) -> Result<()>;

    /// Remove every chunk of one manual, clearing the way for re-ingestion.
    async fn delete_by_manual(&self, manual_id: &str) -> Result<()>;

    /// Nearest notes by cosine distance, scope-filtered, closest first.
    async fn nearest_notes(
        &self,
        vector: &[f32],
        k: usize,
        scope: Option<&str>,
    ) -> Result<Vec<ScoredDocument>>;

    /// Nearest manual chunks by cosine distance, scope-filtered via the
    /// machine's linked manuals, closest first.
    async fn nearest_chunks(
        &self,
        vector: &[f32],
        k: usize,
        scope: Option<&str>,
    ) -> Result<Vec<ScoredDocument>>;

    /// The scope's full document set in a stable order, for lexical
    /// indexing. Includes documents that lack an embedding.
    async fn all_documents(&self, scope: Option<&str>) -> Result<Vec<Document>>;
}

/// External vision service turning an embedded figure into searchable text.
#[async_trait]
pub trait VisionDescriber: Send + Sync {
    async fn describe(&self, image: &PageImage) -> Result<String>;
}
