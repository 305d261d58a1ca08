//! Error types for the edgequake-pdf-rag library.
//!
//! Three layers, from the outside in:
//!
//! * [`RagError`]: **fatal** for the current request. An ingest batch or a
//!   query cannot complete. Every variant names the stage that failed so the
//!   caller can tell a bad upload from a sick model server.
//!
//! * [`ModelCallError`]: what went wrong talking to a model (timeout,
//!   exhausted retries, empty answer). Carried as the `#[source]` of the
//!   model-stage variants of [`RagError`].
//!
//! * [`crate::index::IndexError`]: vector-store faults, converted with `?`.
//!
//! Ingestion stages everything before it commits, so any `Err` returned from
//! an ingest call means the index and the snapshot were left untouched.

use crate::index::IndexError;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf-rag library.
#[derive(Debug, Error)]
pub enum RagError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The request itself is unusable (empty batch, blank question, …).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The uploaded bytes are not a readable PDF.
    #[error("Could not parse PDF '{filename}': {detail}")]
    DocumentParse { filename: String, detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The vision model could not transcribe a page.
    #[error("Transcription failed for '{filename}' page {page}: {source}")]
    Transcription {
        filename: String,
        page: usize,
        #[source]
        source: ModelCallError,
    },

    /// A transcribed page could not be embedded during ingestion.
    #[error("Embedding failed for '{filename}' page {page}: {source}")]
    Embedding {
        filename: String,
        page: usize,
        #[source]
        source: ModelCallError,
    },

    /// The question could not be embedded for retrieval.
    #[error("Retrieval failed: {source}")]
    Retrieval {
        #[source]
        source: ModelCallError,
    },

    /// The text model could not produce an answer.
    #[error("Answer generation failed: {source}")]
    Generation {
        #[source]
        source: ModelCallError,
    },

    // ── Store errors ──────────────────────────────────────────────────────
    /// The vector index rejected an operation.
    #[error("Vector index error: {0}")]
    Index(#[from] IndexError),

    /// The transcription snapshot could not be written.
    #[error("Failed to write transcription snapshot '{path}': {source}")]
    SnapshotWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The transcription snapshot exists but could not be read back.
    #[error("Failed to read transcription snapshot '{path}': {detail}")]
    SnapshotRead { path: PathBuf, detail: String },

    // ── Setup errors ──────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key, unknown name…).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install pdfium (https://github.com/bblanchon/pdfium-binaries) and either put it\n\
on the system library path or set PDFIUM_LIB_PATH=/path/to/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RagError {
    /// `true` when the caller sent something unusable and retrying the same
    /// request cannot succeed; `false` for upstream or internal faults.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RagError::InvalidInput(_) | RagError::DocumentParse { .. }
        )
    }

    /// `true` when a model server (OCR, embedding or generation) failed.
    pub fn is_upstream_error(&self) -> bool {
        matches!(
            self,
            RagError::Transcription { .. }
                | RagError::Embedding { .. }
                | RagError::Retrieval { .. }
                | RagError::Generation { .. }
        )
    }
}

/// A failed call to one of the models.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelCallError {
    /// Every attempt hit the per-call timeout.
    #[error("model call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider returned an error on every attempt.
    #[error("model call failed after {attempts} attempt(s): {detail}")]
    Failed { attempts: u32, detail: String },

    /// The provider answered, but with nothing usable.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// The page image could not be encoded for the request.
    #[error("page image encoding failed: {0}")]
    ImageEncoding(String),
}
