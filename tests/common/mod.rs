//! In-process fakes for the model-facing seams.
//!
//! A fake PDF is `%PDF-fake\n` followed by a JSON array of page texts.
//! [`FakeRasterizer`] registers each page text in a shared table and encodes
//! the table key as the width of a 1-pixel-high image; [`TableTranscriber`]
//! reads it back. Transcription therefore stays correct under concurrency.
//!
//! Page texts with special meaning for [`TableTranscriber`]:
//! * `"!fail"`  → `ModelCallError::Timeout`
//! * `""`       → `ModelCallError::EmptyResponse`

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_pdf_rag::pipeline::render::check_pdf_magic;
use edgequake_pdf_rag::{
    Embedder, Embedding, Generator, InMemoryVectorStore, IngestProgressCallback, ModelCallError,
    PageRasterizer, RagConfig, RagError, RagService, RenderedPage, ServiceComponents, Transcriber,
};
use image::{DynamicImage, RgbImage};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const EMBED_MODEL: &str = "bow-test";

/// Words the bag-of-words embedder counts, one dimension each.
pub const VOCAB: &[&str] = &[
    "name", "jane", "doe", "skills", "go", "rust", "candidate", "experience", "education",
    "python", "alpha", "beta", "gamma",
];

/// Bytes of a fake PDF whose pages transcribe to `pages`.
pub fn fake_pdf(pages: &[&str]) -> Vec<u8> {
    let mut bytes = b"%PDF-fake\n".to_vec();
    bytes.extend(serde_json::to_vec(pages).unwrap());
    bytes
}

// ── Rasterizer + transcriber ─────────────────────────────────────────────────

#[derive(Default)]
pub struct PageTable {
    texts: Mutex<Vec<String>>,
}

impl PageTable {
    fn register(&self, text: &str) -> u32 {
        let mut texts = self.texts.lock().unwrap();
        texts.push(text.to_string());
        texts.len() as u32
    }

    fn lookup(&self, key: u32) -> String {
        self.texts.lock().unwrap()[key as usize - 1].clone()
    }
}

pub struct FakeRasterizer {
    table: Arc<PageTable>,
}

#[async_trait]
impl PageRasterizer for FakeRasterizer {
    async fn rasterize(&self, filename: &str, bytes: &[u8]) -> Result<Vec<RenderedPage>, RagError> {
        check_pdf_magic(filename, bytes)?;
        let body = bytes
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| &bytes[i + 1..])
            .unwrap_or_default();
        let pages: Vec<String> =
            serde_json::from_slice(body).map_err(|e| RagError::DocumentParse {
                filename: filename.to_string(),
                detail: e.to_string(),
            })?;

        Ok(pages
            .iter()
            .enumerate()
            .map(|(page_index, text)| RenderedPage {
                page_index,
                image: DynamicImage::ImageRgb8(RgbImage::new(self.table.register(text), 1)),
            })
            .collect())
    }
}

pub struct TableTranscriber {
    table: Arc<PageTable>,
    /// Later pages answer sooner, to shake out ordering bugs.
    pub stagger: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Transcriber for TableTranscriber {
    async fn transcribe(&self, page: &RenderedPage) -> Result<String, ModelCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stagger {
            let delay = 10u64.saturating_sub(page.page_index as u64) * 5;
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let text = self.table.lookup(page.image.width());
        match text.as_str() {
            "!fail" => Err(ModelCallError::Timeout { secs: 60 }),
            t if t.trim().is_empty() => Err(ModelCallError::EmptyResponse),
            _ => Ok(text),
        }
    }
}

// ── Embedder ─────────────────────────────────────────────────────────────────

pub struct BagOfWordsEmbedder {
    pub model: String,
    pub fail: bool,
}

impl BagOfWordsEmbedder {
    pub fn new() -> Self {
        Self {
            model: EMBED_MODEL.to_string(),
            fail: false,
        }
    }
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    VOCAB
        .iter()
        .map(|w| tokens.iter().filter(|t| *t == w).count() as f32)
        .collect()
}

#[async_trait]
impl Embedder for BagOfWordsEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Embedding, ModelCallError> {
        if self.fail {
            return Err(ModelCallError::Failed {
                attempts: 4,
                detail: "connection refused".into(),
            });
        }
        Ok(Embedding::new(self.model.clone(), bag_of_words(text)))
    }
}

// ── Generator ────────────────────────────────────────────────────────────────

/// Answers only from the context it is given, and records every request.
#[derive(Default)]
pub struct RecordingGenerator {
    pub requests: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingGenerator {
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<String, ModelCallError> {
        self.requests
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        if self.fail {
            return Err(ModelCallError::EmptyResponse);
        }
        if user.contains("Jane Doe") {
            Ok("The candidate's name is Jane Doe.".to_string())
        } else {
            Ok("The resume does not say.".to_string())
        }
    }
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct CountingProgress {
    pub batches: AtomicUsize,
    pub documents: AtomicUsize,
    pub pages: AtomicUsize,
    pub completed: AtomicUsize,
    pub failed: AtomicUsize,
}

impl IngestProgressCallback for CountingProgress {
    fn on_batch_start(&self, _documents: usize) {
        self.batches.fetch_add(1, Ordering::SeqCst);
    }

    fn on_document_start(&self, _filename: &str, _pages: usize) {
        self.documents.fetch_add(1, Ordering::SeqCst);
    }

    fn on_page_transcribed(&self, _f: &str, _i: usize, _t: usize, _len: usize) {
        self.pages.fetch_add(1, Ordering::SeqCst);
    }

    fn on_batch_complete(&self, _documents: usize, pages: usize) {
        self.completed.store(pages, Ordering::SeqCst);
    }

    fn on_batch_failed(&self, _error: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

pub struct Harness {
    pub service: RagService,
    pub store: Arc<InMemoryVectorStore>,
    pub transcriber: Arc<TableTranscriber>,
    pub generator: Arc<RecordingGenerator>,
    pub config: RagConfig,
}

pub struct HarnessBuilder {
    config: RagConfig,
    store: Option<Arc<InMemoryVectorStore>>,
    embedder: BagOfWordsEmbedder,
    generator: RecordingGenerator,
    stagger: bool,
}

impl HarnessBuilder {
    pub fn new(static_dir: &Path) -> Self {
        Self {
            config: RagConfig::builder()
                .static_dir(static_dir)
                .build()
                .unwrap(),
            store: None,
            embedder: BagOfWordsEmbedder::new(),
            generator: RecordingGenerator::default(),
            stagger: false,
        }
    }

    pub fn config(mut self, f: impl FnOnce(RagConfig) -> RagConfig) -> Self {
        self.config = f(self.config);
        self
    }

    pub fn store(mut self, store: Arc<InMemoryVectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn embedding_model(mut self, model: &str) -> Self {
        self.embedder.model = model.to_string();
        self
    }

    pub fn failing_embedder(mut self) -> Self {
        self.embedder.fail = true;
        self
    }

    pub fn failing_generator(mut self) -> Self {
        self.generator.fail = true;
        self
    }

    pub fn staggered(mut self) -> Self {
        self.stagger = true;
        self
    }

    pub fn build(self) -> Harness {
        let table = Arc::new(PageTable::default());
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryVectorStore::new()));
        let transcriber = Arc::new(TableTranscriber {
            table: Arc::clone(&table),
            stagger: self.stagger,
            calls: AtomicUsize::new(0),
        });
        let generator = Arc::new(self.generator);

        let components = ServiceComponents {
            rasterizer: Arc::new(FakeRasterizer { table }),
            transcriber: transcriber.clone(),
            embedder: Arc::new(self.embedder),
            generator: generator.clone(),
            store: store.clone(),
        };

        Harness {
            service: RagService::new(components, &self.config),
            store,
            transcriber,
            generator,
            config: self.config,
        }
    }
}
