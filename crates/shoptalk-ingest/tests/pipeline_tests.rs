use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use shoptalk_core::chunker::ChunkingConfig;
use shoptalk_core::traits::{CorpusStore, VisionDescriber};
use shoptalk_core::types::{
    ChunkKind, Document, Manual, ManualPage, NoAnswerReason, PageImage, Retrieval,
};
use shoptalk_core::{Error, Result};
use shoptalk_embed::{FakeEmbedder, EMBEDDING_DIM};
use shoptalk_hybrid::{HybridRetriever, RetrievalParams};
use shoptalk_ingest::ManualIngestor;
use shoptalk_lexical::IndexManager;
use shoptalk_store::MemoryStore;

/// Describer double: succeeds unless the image payload is marked FAIL, and
/// counts how often it is consulted.
struct FakeVision {
    calls: AtomicUsize,
}

impl FakeVision {
    fn new() -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl VisionDescriber for FakeVision {
    async fn describe(&self, image: &PageImage) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if image.bytes.starts_with(b"FAIL") {
            return Err(Error::provider("vision", "backend rejected the image"));
        }
        Ok("a wiring diagram of the spindle drive with labeled terminals".to_string())
    }
}

fn manual(id: &str) -> Manual {
    Manual {
        id: id.to_string(),
        title: "Mill Troubleshooting Manual".to_string(),
        manual_type: Some("troubleshooting".to_string()),
        source_url: None,
        machines: vec!["m1".to_string()],
    }
}

fn page(number: u32, text: &str, images: Vec<PageImage>) -> ManualPage {
    ManualPage { number, text: text.to_string(), images }
}

fn img(width: u32, height: u32, bytes: &[u8]) -> PageImage {
    PageImage { width, height, bytes: bytes.to_vec() }
}

fn build(
    store: Arc<dyn CorpusStore>,
    vision: Option<Arc<dyn VisionDescriber>>,
) -> (ManualIngestor, Arc<IndexManager>) {
    let embedder = Arc::new(FakeEmbedder::new(EMBEDDING_DIM));
    let index = Arc::new(IndexManager::new(store.clone()));
    let ingestor = ManualIngestor::new(
        store,
        embedder,
        index.clone(),
        vision,
        ChunkingConfig::default(),
    );
    (ingestor, index)
}

#[tokio::test]
async fn chunks_are_persisted_with_section_and_page_provenance() {
    let store = Arc::new(MemoryStore::new());
    let (ingestor, _) = build(store.clone(), None);

    let pages = vec![page(
        12,
        "TROUBLESHOOTING\nerror code E34 indicates a spindle drive fault, check the vector drive",
        vec![],
    )];
    let report = ingestor.ingest(&manual("mill-ts"), &pages).await.expect("ingest");
    assert_eq!(report.text_chunks, 1);
    assert_eq!(report.total_chunks(), 1);

    let docs = store.all_documents(Some("m1")).await.expect("all");
    assert_eq!(docs.len(), 1);
    match &docs[0] {
        Document::Chunk(c) => {
            assert_eq!(c.page_number, 12);
            assert_eq!(c.section_title.as_deref(), Some("TROUBLESHOOTING"));
            assert_eq!(c.kind, ChunkKind::Text);
            assert_eq!(c.manual_title, "Mill Troubleshooting Manual");
        }
        other => panic!("expected a chunk, got {other:?}"),
    }
}

#[tokio::test]
async fn reingestion_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let (ingestor, _) = build(store.clone(), None);

    let text = (0..1200).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
    let pages = vec![page(1, &text, vec![]), page(2, "short page with a handful of words", vec![])];

    let first = ingestor.ingest(&manual("mill-ts"), &pages).await.expect("first run");
    let ids_first: Vec<String> = chunk_ids(&store).await;

    let second = ingestor.ingest(&manual("mill-ts"), &pages).await.expect("second run");
    let ids_second: Vec<String> = chunk_ids(&store).await;

    assert_eq!(first.total_chunks(), second.total_chunks());
    assert_eq!(ids_first, ids_second, "same content, same chunk boundaries and ids");
}

async fn chunk_ids(store: &Arc<MemoryStore>) -> Vec<String> {
    store
        .all_documents(None)
        .await
        .expect("all")
        .iter()
        .filter_map(|d| match d {
            Document::Chunk(c) => Some(c.id.clone()),
            Document::Note(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn one_failing_figure_never_aborts_the_run() {
    let store = Arc::new(MemoryStore::new());
    let vision = FakeVision::new();
    let (ingestor, _) = build(store.clone(), Some(vision.clone()));

    let pages = vec![page(
        3,
        "hydraulic schematic overview for the tailstock assembly",
        vec![img(200, 200, b"PNGDATA-good"), img(200, 200, b"FAIL-this-one")],
    )];
    let report = ingestor.ingest(&manual("lathe-svc"), &pages).await.expect("ingest");

    assert_eq!(report.text_chunks, 1);
    assert_eq!(report.figure_chunks, 1, "the good figure still lands");
    assert_eq!(report.figures_skipped, 1, "the bad figure is skipped, not fatal");
    assert_eq!(vision.calls.load(Ordering::SeqCst), 2);

    let described: Vec<String> = store
        .all_documents(None)
        .await
        .expect("all")
        .iter()
        .filter_map(|d| match d {
            Document::Chunk(c) if c.kind == ChunkKind::ImageDescription => Some(c.text.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(described.len(), 1);
    assert!(
        described[0].starts_with("[Image from page 3]: "),
        "descriptions carry their source page prefix"
    );
}

#[tokio::test]
async fn icons_below_the_pixel_floor_never_reach_the_describer() {
    let store = Arc::new(MemoryStore::new());
    let vision = FakeVision::new();
    let (ingestor, _) = build(store, Some(vision.clone()));

    let pages = vec![page(
        1,
        "a page of safety notes with small bullet glyphs in the margin",
        vec![img(16, 16, b"tiny"), img(99, 300, b"narrow")],
    )];
    let report = ingestor.ingest(&manual("safety"), &pages).await.expect("ingest");

    assert_eq!(vision.calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.figure_chunks, 0);
}

#[tokio::test]
async fn unconfigured_vision_skips_the_figure_stage_for_the_whole_run() {
    let store = Arc::new(MemoryStore::new());
    let (ingestor, _) = build(store.clone(), None);

    let pages = vec![page(
        5,
        "axis lubrication points are shown in the figure below for reference",
        vec![img(400, 400, b"PNGDATA")],
    )];
    let report = ingestor.ingest(&manual("mill-ops"), &pages).await.expect("ingest");

    assert_eq!(report.text_chunks, 1);
    assert_eq!(report.figure_chunks, 0);
    assert_eq!(report.figures_skipped, 0, "the stage is skipped, not failing per image");
}

#[tokio::test]
async fn reingesting_to_zero_valid_pages_empties_the_scope() {
    let store = Arc::new(MemoryStore::new());
    let (ingestor, index) = build(store.clone(), None);

    let pages = vec![page(1, "spindle drive fault codes and their recovery procedures", vec![])];
    ingestor.ingest(&manual("mill-ts"), &pages).await.expect("first ingest");
    assert_eq!(chunk_ids(&store).await.len(), 1);

    // Re-run with nothing but noise: every span is under the word floor.
    let noise = vec![page(1, "too short", vec![])];
    let report = ingestor.ingest(&manual("mill-ts"), &noise).await.expect("re-ingest");
    assert_eq!(report.total_chunks(), 0);
    assert!(chunk_ids(&store).await.is_empty());

    // The manual was the scope's only source, so retrieval now reports an
    // empty corpus.
    let embedder = Arc::new(FakeEmbedder::new(EMBEDDING_DIM));
    let retriever = HybridRetriever::new(store, embedder, index, RetrievalParams::default());
    let result = retriever.retrieve("spindle fault", 5, Some("m1")).await.expect("retrieve");
    match result {
        Retrieval::NoAnswer { reason } => assert_eq!(reason, NoAnswerReason::EmptyCorpus),
        Retrieval::Answer { .. } => panic!("deleted corpus cannot answer"),
    }
}
