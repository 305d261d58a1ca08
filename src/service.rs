//! The process-level owner of the index and the snapshot.
//!
//! [`RagService`] is constructed once and shared (behind an `Arc`) by every
//! request handler. Ingest calls are serialised through a single-writer
//! mutex; queries take no lock and see an index either before or after a
//! batch commit, never in between.

use crate::config::RagConfig;
use crate::error::RagError;
use crate::index::{InMemoryVectorStore, VectorStore};
use crate::ingest::IngestionPipeline;
use crate::output::{DocumentTranscription, IngestDocument, IngestReport, QueryAnswer};
use crate::pipeline::embed::{Embedder, ProviderEmbedder};
use crate::pipeline::llm::{ChatGenerator, Generator, Transcriber, VisionTranscriber};
use crate::pipeline::render::{PageRasterizer, PdfiumRasterizer};
use crate::provider::{resolve_embedding_provider, resolve_text_provider, resolve_vision_provider};
use crate::query::QueryPipeline;
use crate::snapshot::SnapshotStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// The five collaborators a service is wired from.
#[derive(Clone)]
pub struct ServiceComponents {
    pub rasterizer: Arc<dyn PageRasterizer>,
    pub transcriber: Arc<dyn Transcriber>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub store: Arc<dyn VectorStore>,
}

impl ServiceComponents {
    /// Real providers, pdfium and a fresh in-memory index.
    pub fn from_config(config: &RagConfig) -> Result<Self, RagError> {
        let policy = config.call_policy();

        let mut transcriber = VisionTranscriber::new(resolve_vision_provider(config)?, policy)
            .with_sampling(config.temperature, config.max_tokens);
        if let Some(ref prompt) = config.transcription_prompt {
            transcriber = transcriber.with_prompt(prompt.clone());
        }

        let generator = ChatGenerator::new(resolve_text_provider(config)?, policy)
            .with_sampling(config.temperature, config.max_tokens);

        let embedder = ProviderEmbedder::new(
            resolve_embedding_provider(config)?,
            config.embedding_model.clone(),
            policy,
        );

        Ok(Self {
            rasterizer: Arc::new(PdfiumRasterizer::new(
                config.render_scale,
                config.pdfium_library.clone(),
            )),
            transcriber: Arc::new(transcriber),
            embedder: Arc::new(embedder),
            generator: Arc::new(generator),
            store: Arc::new(InMemoryVectorStore::new()),
        })
    }
}

/// Ingest and query over one shared index.
pub struct RagService {
    ingestion: IngestionPipeline,
    query: QueryPipeline,
    store: Arc<dyn VectorStore>,
    snapshot: SnapshotStore,
    static_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl RagService {
    pub fn new(components: ServiceComponents, config: &RagConfig) -> Self {
        let snapshot = SnapshotStore::new(config.snapshot_path());

        let mut ingestion = IngestionPipeline::new(
            components.rasterizer,
            components.transcriber,
            Arc::clone(&components.embedder),
            Arc::clone(&components.store),
            snapshot.clone(),
        )
        .with_page_concurrency(config.page_concurrency)
        .with_progress(config.progress_callback.clone());
        if config.persist_page_images {
            ingestion = ingestion.with_page_images(config.static_dir.clone());
        }

        let query = QueryPipeline::new(
            components.embedder,
            Arc::clone(&components.store),
            components.generator,
            config.top_k,
        );

        Self {
            ingestion,
            query,
            store: components.store,
            snapshot,
            static_dir: config.static_dir.clone(),
            write_lock: Mutex::new(()),
        }
    }

    /// Build a service with providers resolved from `config`.
    pub fn from_config(config: &RagConfig) -> Result<Self, RagError> {
        info!(
            "Models: vision={} embedding={} text={} (provider {})",
            config.vision_model, config.embedding_model, config.text_model, config.provider_name
        );
        Ok(Self::new(ServiceComponents::from_config(config)?, config))
    }

    /// Ingest a batch, replacing the snapshot. Concurrent calls run one at a time.
    pub async fn ingest(&self, documents: Vec<IngestDocument>) -> Result<IngestReport, RagError> {
        let _guard = self.write_lock.lock().await;
        self.ingestion.ingest(documents).await
    }

    /// Answer a question from the current index.
    pub async fn query(&self, question: &str) -> Result<QueryAnswer, RagError> {
        self.query.answer(question).await
    }

    /// The transcriptions of the last committed batch, if any.
    pub async fn snapshot(&self) -> Result<Option<Vec<DocumentTranscription>>, RagError> {
        self.snapshot.load().await
    }

    pub async fn index_len(&self) -> Result<usize, RagError> {
        Ok(self.store.len().await?)
    }

    /// Directory holding the snapshot and any saved page images.
    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }
}
