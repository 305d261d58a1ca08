//! Ingestion: PDFs → page transcriptions → index entries + snapshot.
//!
//! ## Staging
//!
//! Nothing is written while the batch is processed. Every page's entry and
//! transcription is accumulated in memory; once all documents succeeded the
//! snapshot is staged to a temp file, the entries are committed to the store
//! in one `upsert_batch`, and the snapshot is renamed into place. Any error
//! before that point leaves both the index and the snapshot as they were.
//!
//! ## Page concurrency
//!
//! Pages of one document are transcribed and embedded through
//! `buffered(page_concurrency)`, which yields results in input order, so the
//! snapshot and the committed entries keep strict page order at any setting.
//! Documents are processed one after another.

use crate::error::RagError;
use crate::index::{entry_id, Embedding, EntryMetadata, IndexEntry, VectorStore};
use crate::output::{DocumentSummary, DocumentTranscription, IngestDocument, IngestReport};
use crate::pipeline::embed::Embedder;
use crate::pipeline::encode::persist_page_image;
use crate::pipeline::llm::Transcriber;
use crate::pipeline::render::{PageRasterizer, RenderedPage};
use crate::progress::ProgressCallback;
use crate::snapshot::SnapshotStore;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Drives rasterise → transcribe → embed → commit for a batch of PDFs.
pub struct IngestionPipeline {
    rasterizer: Arc<dyn PageRasterizer>,
    transcriber: Arc<dyn Transcriber>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    snapshot: SnapshotStore,
    page_concurrency: usize,
    page_image_dir: Option<PathBuf>,
    progress: Option<ProgressCallback>,
}

/// Everything one document contributes to the batch.
struct StagedDocument {
    transcription: DocumentTranscription,
    entries: Vec<IndexEntry>,
}

impl IngestionPipeline {
    pub fn new(
        rasterizer: Arc<dyn PageRasterizer>,
        transcriber: Arc<dyn Transcriber>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        snapshot: SnapshotStore,
    ) -> Self {
        Self {
            rasterizer,
            transcriber,
            embedder,
            store,
            snapshot,
            page_concurrency: 1,
            page_image_dir: None,
            progress: None,
        }
    }

    pub fn with_page_concurrency(mut self, n: usize) -> Self {
        self.page_concurrency = n.max(1);
        self
    }

    /// Save every rendered page as PNG into `dir`.
    pub fn with_page_images(mut self, dir: impl Into<PathBuf>) -> Self {
        self.page_image_dir = Some(dir.into());
        self
    }

    pub fn with_progress(mut self, cb: Option<ProgressCallback>) -> Self {
        self.progress = cb;
        self
    }

    /// Ingest a batch. On `Err`, the index and the snapshot are unchanged.
    pub async fn ingest(&self, documents: Vec<IngestDocument>) -> Result<IngestReport, RagError> {
        if documents.is_empty() {
            return Err(RagError::InvalidInput("no documents in upload".into()));
        }
        if let Some(pos) = documents.iter().position(|d| d.filename.trim().is_empty()) {
            return Err(RagError::InvalidInput(format!(
                "document #{} has no filename",
                pos + 1
            )));
        }

        if let Some(ref cb) = self.progress {
            cb.on_batch_start(documents.len());
        }
        info!("Ingesting batch of {} document(s)", documents.len());

        let result = self.run_batch(&documents).await;
        if let (Err(e), Some(cb)) = (&result, &self.progress) {
            cb.on_batch_failed(&e.to_string());
        }
        result
    }

    async fn run_batch(&self, documents: &[IngestDocument]) -> Result<IngestReport, RagError> {
        let start = Instant::now();

        let mut transcriptions = Vec::with_capacity(documents.len());
        let mut entries = Vec::new();

        for doc in documents {
            let staged = self.process_document(doc).await?;
            entries.extend(staged.entries);
            transcriptions.push(staged.transcription);
        }

        // ── Commit ────────────────────────────────────────────────────────
        let total_pages = entries.len();
        let staged_snapshot = self.snapshot.stage(&transcriptions).await?;

        if let Err(e) = self.store.upsert_batch(entries).await {
            staged_snapshot.discard().await;
            return Err(e.into());
        }
        staged_snapshot.commit().await?;

        let documents: Vec<DocumentSummary> = transcriptions
            .iter()
            .map(|t| DocumentSummary {
                filename: t.filename.clone(),
                pages: t.pages.len(),
            })
            .collect();

        if let Some(ref cb) = self.progress {
            cb.on_batch_complete(documents.len(), total_pages);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Committed {} page(s) from {} document(s) in {}ms",
            total_pages,
            documents.len(),
            duration_ms
        );

        Ok(IngestReport {
            documents,
            total_pages,
            duration_ms,
        })
    }

    async fn process_document(&self, doc: &IngestDocument) -> Result<StagedDocument, RagError> {
        let filename = doc.filename.as_str();
        let pages = self.rasterizer.rasterize(filename, &doc.bytes).await?;
        let total = pages.len();
        info!("'{}': {} page(s) rendered", filename, total);

        if let Some(ref dir) = self.page_image_dir {
            self.persist_images(dir, &pages).await;
        }

        if let Some(ref cb) = self.progress {
            cb.on_document_start(filename, total);
        }

        let page_futures: Vec<_> = pages
            .iter()
            .map(|page| self.process_page(filename, page, total))
            .collect();
        let processed: Vec<(String, Embedding)> = stream::iter(page_futures)
            .buffered(self.page_concurrency)
            .try_collect()
            .await?;

        let mut texts = Vec::with_capacity(total);
        let mut entries = Vec::with_capacity(total);
        for (page_index, (text, embedding)) in processed.into_iter().enumerate() {
            entries.push(IndexEntry {
                id: entry_id(filename, page_index),
                embedding,
                document_text: text.clone(),
                metadata: EntryMetadata {
                    filename: filename.to_string(),
                },
            });
            texts.push(text);
        }

        if let Some(ref cb) = self.progress {
            cb.on_document_complete(filename, total);
        }

        Ok(StagedDocument {
            transcription: DocumentTranscription {
                filename: filename.to_string(),
                pages: texts,
            },
            entries,
        })
    }

    async fn process_page(
        &self,
        filename: &str,
        page: &RenderedPage,
        total: usize,
    ) -> Result<(String, Embedding), RagError> {
        let text = self
            .transcriber
            .transcribe(page)
            .await
            .map_err(|source| RagError::Transcription {
                filename: filename.to_string(),
                page: page.page_index,
                source,
            })?;

        if let Some(ref cb) = self.progress {
            cb.on_page_transcribed(filename, page.page_index, total, text.len());
        }
        debug!("'{}' page {}: {} chars", filename, page.page_index, text.len());

        let embedding = self
            .embedder
            .embed(&text)
            .await
            .map_err(|source| RagError::Embedding {
                filename: filename.to_string(),
                page: page.page_index,
                source,
            })?;

        Ok((text, embedding))
    }

    /// Best-effort: a failed write is logged and ingestion continues.
    async fn persist_images(&self, dir: &std::path::Path, pages: &[RenderedPage]) {
        let dir = dir.to_path_buf();
        let pages = pages.to_vec();
        let result = tokio::task::spawn_blocking(move || {
            for page in &pages {
                if let Err(e) = persist_page_image(&dir, page.page_index, &page.image) {
                    warn!("Could not save page {} image: {}", page.page_index, e);
                }
            }
        })
        .await;
        if let Err(e) = result {
            warn!("Page image task failed: {}", e);
        }
    }
}
