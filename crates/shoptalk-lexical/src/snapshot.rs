use shoptalk_core::types::{Document, MachineId};

use crate::bm25::{tokenize, Bm25};

/// An immutable point-in-time build of the lexical index for one scope:
/// the scope's documents in a stable order plus fitted term statistics.
pub struct LexicalSnapshot {
    scope: Option<MachineId>,
    version: u64,
    documents: Vec<Document>,
    model: Bm25,
}

impl LexicalSnapshot {
    /// Fit term statistics over the scope's full document set. Building
    /// from an empty set is valid and yields a snapshot that scores
    /// nothing.
    pub fn build(scope: Option<&str>, documents: Vec<Document>, version: u64) -> Self {
        let tokenized: Vec<Vec<String>> =
            documents.iter().map(|d| tokenize(d.text())).collect();
        let model = Bm25::fit(&tokenized);
        Self { scope: scope.map(str::to_string), version, documents, model }
    }

    /// BM25 scores for `query`, aligned index-for-index with
    /// [`Self::documents`].
    pub fn scores(&self, query: &str) -> Vec<f32> {
        self.model.scores(&tokenize(query))
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn doc_count(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}
