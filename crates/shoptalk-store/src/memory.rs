//! In-memory `CorpusStore` with brute-force cosine search.
//!
//! The store-side counterpart of the fake embedder: deterministic,
//! dependency-free, and fast enough for tests and local development. Scope
//! semantics are identical to the Lance store.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use shoptalk_core::traits::CorpusStore;
use shoptalk_core::types::{
    Document, Machine, Manual, ManualChunk, Note, ScoredDocument,
};
use shoptalk_core::{Error, Result};

#[derive(Default)]
struct Inner {
    machines: Vec<Machine>,
    manuals: HashMap<String, Manual>,
    notes: Vec<(Note, Option<Vec<f32>>)>,
    chunks: Vec<(ManualChunk, Option<Vec<f32>>)>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| Error::store("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| Error::store("memory store lock poisoned"))
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - dot / (na * nb)
}

fn note_in_scope(note: &Note, scope: Option<&str>) -> bool {
    match scope {
        // Global notes are visible under every scope.
        Some(machine) => note.machine.as_deref() == Some(machine) || note.machine.is_none(),
        None => true,
    }
}

fn rank(mut hits: Vec<ScoredDocument>, k: usize) -> Vec<ScoredDocument> {
    hits.sort_by(|a, b| {
        a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);
    hits
}

impl Inner {
    fn manual_ids_for_machine(&self, machine: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .manuals
            .values()
            .filter(|m| m.machines.iter().any(|mid| mid == machine))
            .map(|m| m.id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn chunk_in_scope(&self, chunk: &ManualChunk, scope: Option<&str>) -> bool {
        match scope {
            Some(machine) => self.manual_ids_for_machine(machine).contains(&chunk.manual_id),
            None => true,
        }
    }
}

#[async_trait]
impl CorpusStore for MemoryStore {
    async fn register_machine(&self, machine: &Machine) -> Result<()> {
        let mut inner = self.write()?;
        inner.machines.retain(|m| m.id != machine.id);
        inner.machines.push(machine.clone());
        Ok(())
    }

    async fn list_machines(&self) -> Result<Vec<Machine>> {
        let inner = self.read()?;
        let mut machines = inner.machines.clone();
        machines.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(machines)
    }

    async fn register_manual(&self, manual: &Manual) -> Result<()> {
        self.write()?.manuals.insert(manual.id.clone(), manual.clone());
        Ok(())
    }

    async fn insert_note(&self, note: &Note, vector: Option<&[f32]>) -> Result<()> {
        self.write()?.notes.push((note.clone(), vector.map(<[f32]>::to_vec)));
        Ok(())
    }

    async fn insert_chunk(&self, chunk: &ManualChunk, vector: Option<&[f32]>) -> Result<()> {
        self.write()?.chunks.push((chunk.clone(), vector.map(<[f32]>::to_vec)));
        Ok(())
    }

    async fn delete_by_manual(&self, manual_id: &str) -> Result<()> {
        self.write()?.chunks.retain(|(c, _)| c.manual_id != manual_id);
        Ok(())
    }

    async fn nearest_notes(
        &self,
        vector: &[f32],
        k: usize,
        scope: Option<&str>,
    ) -> Result<Vec<ScoredDocument>> {
        let inner = self.read()?;
        let hits = inner
            .notes
            .iter()
            .filter(|(note, v)| v.is_some() && note_in_scope(note, scope))
            .map(|(note, v)| ScoredDocument {
                document: Document::Note(note.clone()),
                distance: cosine_distance(vector, v.as_deref().unwrap_or(&[])),
            })
            .collect();
        Ok(rank(hits, k))
    }

    async fn nearest_chunks(
        &self,
        vector: &[f32],
        k: usize,
        scope: Option<&str>,
    ) -> Result<Vec<ScoredDocument>> {
        let inner = self.read()?;
        let hits = inner
            .chunks
            .iter()
            .filter(|(chunk, v)| v.is_some() && inner.chunk_in_scope(chunk, scope))
            .map(|(chunk, v)| ScoredDocument {
                document: Document::Chunk(chunk.clone()),
                distance: cosine_distance(vector, v.as_deref().unwrap_or(&[])),
            })
            .collect();
        Ok(rank(hits, k))
    }

    async fn all_documents(&self, scope: Option<&str>) -> Result<Vec<Document>> {
        let inner = self.read()?;
        let mut notes: Vec<&Note> = inner
            .notes
            .iter()
            .filter(|(note, _)| note_in_scope(note, scope))
            .map(|(note, _)| note)
            .collect();
        notes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut chunks: Vec<&ManualChunk> = inner
            .chunks
            .iter()
            .filter(|(chunk, _)| inner.chunk_in_scope(chunk, scope))
            .map(|(chunk, _)| chunk)
            .collect();
        chunks.sort_by(|a, b| a.id.cmp(&b.id));

        let mut documents: Vec<Document> =
            notes.into_iter().map(|n| Document::Note(n.clone())).collect();
        documents.extend(chunks.into_iter().map(|c| Document::Chunk(c.clone())));
        Ok(documents)
    }
}
