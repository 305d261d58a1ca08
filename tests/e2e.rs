//! End-to-end tests against real pdfium and a live model server.
//!
//! These use PDFs in `./test_cases/` and make real model calls (Ollama by
//! default). They are gated behind the `E2E_ENABLED` environment variable so
//! they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=./libpdfium.so cargo test --test e2e -- --nocapture
//!
//! Models can be switched with `EDGEQUAKE_LLM_PROVIDER`, `PDFRAG_VISION_MODEL`,
//! `PDFRAG_EMBEDDING_MODEL`, `PDFRAG_TEXT_MODEL` and `PDFRAG_EMBEDDING_DIM`.

use edgequake_pdf_rag::pipeline::render::{PageRasterizer, PdfiumRasterizer};
use edgequake_pdf_rag::{IngestDocument, RagConfig, RagError, RagService};
use std::path::PathBuf;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn e2e_config(static_dir: &std::path::Path) -> RagConfig {
    let dims = env_or("PDFRAG_EMBEDDING_DIM", "1024")
        .parse()
        .expect("PDFRAG_EMBEDDING_DIM must be a number");
    RagConfig::builder()
        .provider_name(env_or("EDGEQUAKE_LLM_PROVIDER", "ollama"))
        .vision_model(env_or("PDFRAG_VISION_MODEL", "llama3.2-vision"))
        .embedding_model(env_or("PDFRAG_EMBEDDING_MODEL", "mxbai-embed-large"))
        .text_model(env_or("PDFRAG_TEXT_MODEL", "llama3.2"))
        .embedding_dimension(dims)
        .api_timeout_secs(300)
        .static_dir(static_dir)
        .persist_page_images(true)
        .build()
        .expect("valid config")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("edgequake_pdf_rag=debug")
        .with_test_writer()
        .try_init();
}

// ── Rasterizer (pdfium only, no models) ──────────────────────────────────────

#[tokio::test]
async fn test_rasterize_resume() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("resume.pdf"));
    let bytes = std::fs::read(&path).unwrap();

    let pages = PdfiumRasterizer::new(2.0, None)
        .rasterize("resume.pdf", &bytes)
        .await
        .expect("rasterize should succeed");

    assert!(!pages.is_empty());
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.page_index, i);
        // US Letter at 2× is 1224×1584; A4 is 1190×1684.
        assert!(page.image.width() > 1000, "page {i} too narrow");
    }
}

#[tokio::test]
async fn test_rasterize_truncated_pdf_is_parse_error() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("resume.pdf"));
    let bytes = std::fs::read(&path).unwrap();
    let truncated = &bytes[..bytes.len().min(64)];

    let err = PdfiumRasterizer::new(2.0, None)
        .rasterize("truncated.pdf", truncated)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::DocumentParse { .. }), "got {err:?}");
}

// ── Full pipeline ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_resume_question() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("resume.pdf"));
    init_tracing();

    let tmp = TempDir::new().unwrap();
    let config = e2e_config(tmp.path());
    let service = RagService::from_config(&config).expect("providers should resolve");

    let bytes = std::fs::read(&path).unwrap();
    let report = service
        .ingest(vec![IngestDocument::new("resume.pdf", bytes)])
        .await
        .expect("ingest should succeed");
    println!("Ingested {} page(s) in {}ms", report.total_pages, report.duration_ms);

    assert_eq!(service.index_len().await.unwrap(), report.total_pages);

    let snapshot = service.snapshot().await.unwrap().expect("snapshot written");
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot[0].pages.iter().all(|p| !p.trim().is_empty()));

    let saved_images = std::fs::read_dir(tmp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("page_"))
        .count();
    assert_eq!(saved_images, report.total_pages);

    let answer = service
        .query("What is the candidate's name?")
        .await
        .expect("query should succeed");
    println!("Answer: {}\nSources: {:?}", answer.response, answer.sources);

    assert!(!answer.response.trim().is_empty());
    assert_eq!(answer.sources, vec!["resume.pdf"]);
}
