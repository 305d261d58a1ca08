//! # edgequake-pdf-rag
//!
//! Ask questions about PDF documents. Pages are transcribed by a vision
//! model, indexed by embedding, and questions are answered by a text model
//! that only sees the best-matching pages.
//!
//! ## Why transcribe instead of extract?
//!
//! Text extraction (pdftotext, pdf-extract) has nothing to work with on
//! scanned resumes and mangles two-column layouts. Rasterising each page and
//! letting a vision model read it recovers the text in reading order, with
//! `[illegible]` markers where it cannot.
//!
//! ## Pipeline Overview
//!
//! ```text
//! ingest                                   query
//!  │                                        │
//!  ├─ 1. Render     pdfium, 2× scale        ├─ 1. Embed     the question
//!  ├─ 2. Transcribe vision model per page   ├─ 2. Retrieve  top-k pages (cosine)
//!  ├─ 3. Embed      one vector per page     ├─ 3. Ground    "Resume content: …"
//!  └─ 4. Commit     index + JSON snapshot   └─ 4. Generate  answer + sources
//!                   (all-or-nothing)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf_rag::{IngestDocument, RagConfig, RagService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Defaults: local Ollama with llama3.2-vision, mxbai-embed-large, llama3.2
//!     let config = RagConfig::default();
//!     let service = RagService::from_config(&config)?;
//!
//!     let bytes = std::fs::read("resume.pdf")?;
//!     service.ingest(vec![IngestDocument::new("resume.pdf", bytes)]).await?;
//!
//!     let answer = service.query("What is the candidate's name?").await?;
//!     println!("{} (sources: {:?})", answer.response, answer.sources);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on (via `cli`) | axum HTTP surface: `/upload`, `/query`, `/static` |
//! | `cli`    | on      | Enables the `pdf-rag` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable both when using only the library:
//! ```toml
//! edgequake-pdf-rag = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod index;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod query;
#[cfg(feature = "server")]
pub mod server;
pub mod service;
pub mod snapshot;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RagConfig, RagConfigBuilder};
pub use error::{ModelCallError, RagError};
pub use index::{
    entry_id, Embedding, EntryMetadata, InMemoryVectorStore, IndexEntry, IndexError,
    RetrievedEntry, VectorStore,
};
pub use output::{
    DocumentSummary, DocumentTranscription, IngestDocument, IngestReport, QueryAnswer, INGEST_ACK,
};
pub use pipeline::embed::Embedder;
pub use pipeline::llm::{CallPolicy, Generator, Transcriber};
pub use pipeline::render::{PageRasterizer, RenderedPage};
pub use progress::{IngestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use service::{RagService, ServiceComponents};
