//! Domain types shared by the store, lexical index, and retrieval engines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scope identifier: a machine the query (or note) is restricted to.
pub type MachineId = String;
pub type DocId = String;

/// Which corpus a document belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Note,
    Manual,
}

/// Stable document identity used to fuse scores across retrieval paths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DocKey {
    pub source: SourceType,
    pub id: DocId,
}

/// A free-text shop-floor note.
///
/// `machine: None` marks a global note, visible under every scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: DocId,
    pub text: String,
    pub machine: Option<MachineId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Text,
    ImageDescription,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Text => "text",
            ChunkKind::ImageDescription => "image_description",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "image_description" => ChunkKind::ImageDescription,
            _ => ChunkKind::Text,
        }
    }
}

/// One indexed span of a manual: a text passage or a figure description.
///
/// Chunks are immutable; re-ingesting a manual deletes and regenerates the
/// whole set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualChunk {
    pub id: DocId,
    pub manual_id: String,
    pub manual_title: String,
    pub page_number: u32,
    pub section_title: Option<String>,
    pub kind: ChunkKind,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A scopable machine in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub name: String,
    pub description: Option<String>,
}

/// A registered manual and the machines it applies to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manual {
    pub id: String,
    pub title: String,
    pub manual_type: Option<String>,
    pub source_url: Option<String>,
    pub machines: Vec<MachineId>,
}

/// A retrievable document from either corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Document {
    Note(Note),
    #[serde(rename = "manual")]
    Chunk(ManualChunk),
}

impl Document {
    pub fn key(&self) -> DocKey {
        match self {
            Document::Note(n) => DocKey { source: SourceType::Note, id: n.id.clone() },
            Document::Chunk(c) => DocKey { source: SourceType::Manual, id: c.id.clone() },
        }
    }

    pub fn source(&self) -> SourceType {
        match self {
            Document::Note(_) => SourceType::Note,
            Document::Chunk(_) => SourceType::Manual,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Document::Note(n) => &n.text,
            Document::Chunk(c) => &c.text,
        }
    }
}

/// A nearest-neighbor hit in the store's native metric (cosine distance,
/// lower is closer).
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    pub distance: f32,
}

/// One extracted manual page handed to the chunking pipeline.
#[derive(Debug, Clone)]
pub struct ManualPage {
    pub number: u32,
    pub text: String,
    pub images: Vec<PageImage>,
}

/// An embedded figure extracted from a page, with pixel dimensions so the
/// pipeline can drop icons and bullets without decoding the payload.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// One ranked result of a hybrid retrieval, valid for the lifetime of the
/// query that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub document: Document,
    pub semantic_score: f32,
    pub lexical_score: f32,
    pub fused_score: f32,
}

/// Telemetry accompanying every answerable retrieval, enough to reproduce
/// the ranking decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalDebug {
    pub alpha: f32,
    pub min_confidence: f32,
    pub semantic_notes: usize,
    pub semantic_chunks: usize,
    pub lexical_considered: usize,
    pub top_scores: Vec<f32>,
}

/// Why a retrieval produced no hits. Not an error: callers treat this as
/// "no reliable answer available".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "reason")]
pub enum NoAnswerReason {
    EmptyCorpus,
    LowConfidence { best_score: f32 },
}

impl NoAnswerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoAnswerReason::EmptyCorpus => "EmptyCorpus",
            NoAnswerReason::LowConfidence { .. } => "LowConfidence",
        }
    }
}

impl std::fmt::Display for NoAnswerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a hybrid retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Retrieval {
    Answer {
        hits: Vec<RetrievalHit>,
        debug: RetrievalDebug,
    },
    NoAnswer {
        reason: NoAnswerReason,
    },
}

impl Retrieval {
    pub fn hits(&self) -> &[RetrievalHit] {
        match self {
            Retrieval::Answer { hits, .. } => hits,
            Retrieval::NoAnswer { .. } => &[],
        }
    }
}
