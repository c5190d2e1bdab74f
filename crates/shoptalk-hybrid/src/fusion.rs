//! Score fusion: the pure stage between the two retrieval paths and the
//! confidence gate. Kept free of the store and embedder so the ranking
//! properties are testable in isolation.

use std::collections::HashMap;

use shoptalk_core::types::{DocKey, Document, RetrievalHit};

/// Convert the store's cosine distance into a similarity in `[0, 1]`.
pub fn similarity_from_distance(distance: f32) -> f32 {
    (1.0 - distance).clamp(0.0, 1.0)
}

/// Normalize BM25 scores by the set maximum, defining all-zero output when
/// the maximum is zero.
pub fn normalize_lexical(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(0.0f32, f32::max);
    if max > 0.0 {
        scores.iter().map(|s| s / max).collect()
    } else {
        vec![0.0; scores.len()]
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    document: Document,
    semantic: f32,
    lexical: f32,
}

/// Candidate pool keyed by document identity.
///
/// A document reached by only one path keeps a zero for the other
/// component. Insertion order is preserved so exactly equal fused scores
/// rank deterministically in first-seen retrieval order.
#[derive(Default)]
pub struct CandidatePool {
    order: Vec<DocKey>,
    by_key: HashMap<DocKey, Candidate>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_semantic(&mut self, document: Document, similarity: f32) {
        let key = document.key();
        match self.by_key.get_mut(&key) {
            Some(c) => c.semantic = c.semantic.max(similarity),
            None => {
                self.order.push(key.clone());
                self.by_key.insert(
                    key,
                    Candidate { document, semantic: similarity, lexical: 0.0 },
                );
            }
        }
    }

    pub fn add_lexical(&mut self, document: Document, score: f32) {
        let key = document.key();
        match self.by_key.get_mut(&key) {
            Some(c) => c.lexical = c.lexical.max(score),
            None => {
                self.order.push(key.clone());
                self.by_key.insert(
                    key,
                    Candidate { document, semantic: 0.0, lexical: score },
                );
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Fuse both components per candidate and rank descending by
    /// `alpha * semantic + (1 - alpha) * lexical`. The sort is stable.
    pub fn rank(mut self, alpha: f32, top_k: usize) -> Vec<RetrievalHit> {
        let mut hits: Vec<RetrievalHit> = self
            .order
            .iter()
            .filter_map(|key| self.by_key.remove(key))
            .map(|c| RetrievalHit {
                fused_score: alpha * c.semantic + (1.0 - alpha) * c.lexical,
                document: c.document,
                semantic_score: c.semantic,
                lexical_score: c.lexical,
            })
            .collect();
        hits.sort_by(|a, b| {
            b.fused_score
                .partial_cmp(&a.fused_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        hits
    }
}

/// Inclusive confidence gate: the top hit passes at or above the
/// threshold; strictly below is refused.
pub fn passes_gate(hits: &[RetrievalHit], min_confidence: f32) -> bool {
    hits.first().map(|h| h.fused_score >= min_confidence).unwrap_or(false)
}
