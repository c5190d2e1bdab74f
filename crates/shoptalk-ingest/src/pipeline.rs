//! Manual ingestion: pages → chunks → figure descriptions → embeddings →
//! store, with a wholesale delete of the manual's previous chunks first.

use std::sync::Arc;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use shoptalk_core::chunker::{chunk_page, ChunkingConfig};
use shoptalk_core::traits::{CorpusStore, Embedder, VisionDescriber};
use shoptalk_core::types::{ChunkKind, Manual, ManualChunk, ManualPage};
use shoptalk_core::Result;
use shoptalk_lexical::IndexManager;

/// Figures smaller than this on either side are icons and bullets, not
/// diagrams worth describing.
const MIN_IMAGE_PX: u32 = 100;

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub pages: usize,
    pub text_chunks: usize,
    pub figure_chunks: usize,
    pub figures_skipped: usize,
}

impl IngestReport {
    pub fn total_chunks(&self) -> usize {
        self.text_chunks + self.figure_chunks
    }
}

pub struct ManualIngestor {
    store: Arc<dyn CorpusStore>,
    embedder: Arc<dyn Embedder>,
    index: Arc<IndexManager>,
    vision: Option<Arc<dyn VisionDescriber>>,
    chunking: ChunkingConfig,
}

impl ManualIngestor {
    pub fn new(
        store: Arc<dyn CorpusStore>,
        embedder: Arc<dyn Embedder>,
        index: Arc<IndexManager>,
        vision: Option<Arc<dyn VisionDescriber>>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self { store, embedder, index, vision, chunking }
    }

    /// Ingest (or re-ingest) one manual.
    ///
    /// The manual's existing chunks are deleted up front, so stale and
    /// fresh chunks never coexist after a successful run; a failed run
    /// surfaces its error to the caller instead of silently mixing. A
    /// single figure that cannot be described is logged and skipped;
    /// without a configured describer the figure stage is skipped for the
    /// whole run.
    pub async fn ingest(&self, manual: &Manual, pages: &[ManualPage]) -> Result<IngestReport> {
        if self.vision.is_none() {
            info!(manual = %manual.id, "no vision describer configured, skipping figure descriptions");
        }
        self.store.register_manual(manual).await?;
        self.store.delete_by_manual(&manual.id).await?;

        let pb = ProgressBar::new(pages.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages ({percent}%) {msg}")
                .expect("valid progress template")
                .progress_chars("#>-"),
        );

        let mut report = IngestReport { pages: pages.len(), ..IngestReport::default() };
        for page in pages {
            pb.set_message(format!("page {}", page.number));
            self.ingest_page(manual, page, &mut report).await?;
            pb.inc(1);
        }
        pb.finish_with_message("ingest complete");

        self.index.invalidate();
        info!(
            manual = %manual.id,
            pages = report.pages,
            text_chunks = report.text_chunks,
            figure_chunks = report.figure_chunks,
            figures_skipped = report.figures_skipped,
            "manual ingested"
        );
        Ok(report)
    }

    async fn ingest_page(
        &self,
        manual: &Manual,
        page: &ManualPage,
        report: &mut IngestReport,
    ) -> Result<()> {
        for (i, span) in chunk_page(&page.text, page.number, &self.chunking)
            .into_iter()
            .enumerate()
        {
            let vector = self.embedder.embed(&span.text)?;
            let chunk = ManualChunk {
                id: format!("{}:{}:{}", manual.id, page.number, i),
                manual_id: manual.id.clone(),
                manual_title: manual.title.clone(),
                page_number: span.page_number,
                section_title: span.section_title,
                kind: ChunkKind::Text,
                text: span.text,
                created_at: Utc::now(),
            };
            self.store.insert_chunk(&chunk, Some(&vector)).await?;
            report.text_chunks += 1;
        }

        let Some(vision) = &self.vision else {
            return Ok(());
        };
        for (i, image) in page.images.iter().enumerate() {
            if image.width < MIN_IMAGE_PX || image.height < MIN_IMAGE_PX {
                continue;
            }
            let description = match vision.describe(image).await {
                Ok(d) if !d.is_empty() => d,
                Ok(_) => {
                    report.figures_skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(page = page.number, error = %e, "figure description failed, skipping image");
                    report.figures_skipped += 1;
                    continue;
                }
            };
            let text = format!("[Image from page {}]: {description}", page.number);
            let vector = self.embedder.embed(&text)?;
            let chunk = ManualChunk {
                id: format!("{}:{}:img{}", manual.id, page.number, i),
                manual_id: manual.id.clone(),
                manual_title: manual.title.clone(),
                page_number: page.number,
                section_title: None,
                kind: ChunkKind::ImageDescription,
                text,
                created_at: Utc::now(),
            };
            self.store.insert_chunk(&chunk, Some(&vector)).await?;
            report.figure_chunks += 1;
        }
        Ok(())
    }
}
