//! The hybrid retriever and the note write path that feeds it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shoptalk_core::traits::{CorpusStore, Embedder};
use shoptalk_core::types::{NoAnswerReason, Note, Retrieval, RetrievalDebug};
use shoptalk_core::Result;
use shoptalk_lexical::IndexManager;

use crate::fusion::{normalize_lexical, passes_gate, similarity_from_distance, CandidatePool};

#[derive(Debug, Clone, Copy)]
pub struct RetrievalParams {
    /// Weight of the semantic component in the fused score.
    pub alpha: f32,
    /// Fused score below which retrieval reports no answer.
    pub min_confidence: f32,
    /// Nearest-neighbor candidates requested per corpus, as a multiple of
    /// `top_k`, to give fusion room to re-rank.
    pub over_fetch: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self { alpha: 0.6, min_confidence: 0.28, over_fetch: 2 }
    }
}

pub struct HybridRetriever {
    store: Arc<dyn CorpusStore>,
    embedder: Arc<dyn Embedder>,
    index: Arc<IndexManager>,
    params: RetrievalParams,
}

impl HybridRetriever {
    pub fn new(
        store: Arc<dyn CorpusStore>,
        embedder: Arc<dyn Embedder>,
        index: Arc<IndexManager>,
        params: RetrievalParams,
    ) -> Self {
        Self { store, embedder, index, params }
    }

    /// Ranked, confidence-gated passages for `query`, or a machine-readable
    /// reason why there is no reliable answer.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        scope: Option<&str>,
    ) -> Result<Retrieval> {
        // Lexical snapshot for this scope. If the rebuild fails the request
        // degrades to semantic-only ranking instead of failing outright.
        let snapshot = match self.index.get_or_rebuild(scope).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "lexical index unavailable, degrading to semantic-only ranking");
                None
            }
        };

        // One query embedding for both corpora. Embedding failure is fatal
        // to this request.
        let query_vec = self.embedder.embed(query)?;

        let fetch_k = top_k.saturating_mul(self.params.over_fetch.max(1)).max(1);
        let sem_notes = self.store.nearest_notes(&query_vec, fetch_k, scope).await?;
        let sem_chunks = self.store.nearest_chunks(&query_vec, fetch_k, scope).await?;
        let semantic_notes = sem_notes.len();
        let semantic_chunks = sem_chunks.len();

        let corpus_is_empty = match &snapshot {
            Some(s) => s.is_empty() && semantic_notes == 0 && semantic_chunks == 0,
            None => semantic_notes == 0 && semantic_chunks == 0,
        };
        if corpus_is_empty {
            return Ok(Retrieval::NoAnswer { reason: NoAnswerReason::EmptyCorpus });
        }

        let mut pool = CandidatePool::new();
        for hit in sem_notes.into_iter().chain(sem_chunks) {
            pool.add_semantic(hit.document, similarity_from_distance(hit.distance));
        }

        // Lexical scores cover the scope's full corpus; the best of them
        // join the pool. Zero-scoring documents cannot change the ranking
        // and are left out unless the semantic path already added them.
        let mut lexical_considered = 0usize;
        if let Some(snapshot) = &snapshot {
            let normalized = normalize_lexical(&snapshot.scores(query));
            let take = fetch_k.max(semantic_notes + semantic_chunks);
            let mut ranked: Vec<(usize, f32)> = normalized
                .iter()
                .copied()
                .enumerate()
                .filter(|(_, s)| *s > 0.0)
                .collect();
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            ranked.truncate(take);
            lexical_considered = ranked.len();
            for (i, score) in ranked {
                pool.add_lexical(snapshot.documents()[i].clone(), score);
            }
        }

        if pool.is_empty() {
            return Ok(Retrieval::NoAnswer {
                reason: NoAnswerReason::LowConfidence { best_score: 0.0 },
            });
        }

        let hits = pool.rank(self.params.alpha, top_k);
        if !passes_gate(&hits, self.params.min_confidence) {
            let best_score = hits.first().map(|h| h.fused_score).unwrap_or(0.0);
            debug!(
                best_score,
                threshold = self.params.min_confidence,
                "best fused score under the confidence gate"
            );
            return Ok(Retrieval::NoAnswer {
                reason: NoAnswerReason::LowConfidence { best_score },
            });
        }

        let debug = RetrievalDebug {
            alpha: self.params.alpha,
            min_confidence: self.params.min_confidence,
            semantic_notes,
            semantic_chunks,
            lexical_considered,
            top_scores: hits.iter().map(|h| h.fused_score).collect(),
        };
        Ok(Retrieval::Answer { hits, debug })
    }

    /// Embed and persist a note as one atomic write, then invalidate the
    /// lexical index so the next query sees it.
    pub async fn save_note(&self, text: &str, machine: Option<&str>) -> Result<Note> {
        let vector = self.embedder.embed(text)?;
        let note = Note {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            machine: machine.map(str::to_string),
            created_at: Utc::now(),
        };
        self.store.insert_note(&note, Some(&vector)).await?;
        self.index.invalidate();
        info!(note_id = %note.id, machine = machine.unwrap_or("<global>"), "note saved");
        Ok(note)
    }
}
