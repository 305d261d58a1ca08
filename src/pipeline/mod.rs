//! Model-facing pipeline stages shared by ingestion and query.
//!
//! Each submodule implements exactly one transformation step behind an
//! object-safe trait, so the pipelines can be driven by real providers in
//! production and by scripted fakes in tests.
//!
//! ## Data Flow
//!
//! ```text
//! ingest: render ──▶ encode ──▶ llm::Transcriber ──▶ embed ──▶ index
//!         (pdfium)   (base64)   (vision model)      (vectors)
//!
//! query:  embed ──▶ index ──▶ llm::Generator
//! ```
//!
//! 1. [`render`]: rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 2. [`encode`]: PNG-encode and base64-wrap each page for the vision
//!    request body, and optionally persist it to disk
//! 3. [`llm`]: timeout, retry and output validation around every chat call
//! 4. [`embed`]: text → model-tagged vector

pub mod embed;
pub mod encode;
pub mod llm;
pub mod render;
