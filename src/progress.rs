//! Progress-callback trait for ingest events.
//!
//! Inject an [`Arc<dyn IngestProgressCallback>`] via
//! [`crate::config::RagConfigBuilder::progress_callback`] to follow a batch as
//! it is rasterised, transcribed and embedded. The CLI uses it to drive a
//! terminal progress bar; a server could forward the same events to a socket.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf_rag::{IngestProgressCallback, RagConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter(AtomicUsize);
//!
//! impl IngestProgressCallback for PageCounter {
//!     fn on_page_transcribed(&self, filename: &str, page_index: usize, total: usize, _len: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{filename}: page {}/{}", page_index + 1, total);
//!     }
//! }
//!
//! let config = RagConfig::builder()
//!     .progress_callback(Arc::new(PageCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the ingestion pipeline as it works through a batch.
///
/// All methods default to no-ops. With `page_concurrency > 1`,
/// `on_page_transcribed` may fire from several tasks at once and out of page
/// order, so implementations must synchronise shared state.
pub trait IngestProgressCallback: Send + Sync {
    /// Called once before the first document is opened.
    fn on_batch_start(&self, documents: usize) {
        let _ = documents;
    }

    /// Called after a document has been rasterised.
    ///
    /// # Arguments
    /// * `filename`: the document's grouping key
    /// * `pages`: page count of the document
    fn on_document_start(&self, filename: &str, pages: usize) {
        let _ = (filename, pages);
    }

    /// Called when a page's transcription comes back from the vision model.
    ///
    /// # Arguments
    /// * `page_index`: 0-based page index
    /// * `total`: pages in this document
    /// * `text_len`: byte length of the transcription
    fn on_page_transcribed(&self, filename: &str, page_index: usize, total: usize, text_len: usize) {
        let _ = (filename, page_index, total, text_len);
    }

    /// Called when every page of a document has been transcribed and embedded.
    fn on_document_complete(&self, filename: &str, pages: usize) {
        let _ = (filename, pages);
    }

    /// Called once after the batch has been committed.
    fn on_batch_complete(&self, documents: usize, pages: usize) {
        let _ = (documents, pages);
    }

    /// Called instead of `on_batch_complete` when the batch is abandoned.
    /// Nothing from the batch was committed.
    fn on_batch_failed(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl IngestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RagConfig`].
pub type ProgressCallback = Arc<dyn IngestProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        documents: AtomicUsize,
        pages: AtomicUsize,
        completed_pages: AtomicUsize,
    }

    impl IngestProgressCallback for TrackingCallback {
        fn on_document_start(&self, _filename: &str, _pages: usize) {
            self.documents.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_transcribed(&self, _f: &str, _i: usize, _t: usize, _len: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _documents: usize, pages: usize) {
            self.completed_pages.store(pages, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_document_start("a.pdf", 3);
        cb.on_page_transcribed("a.pdf", 0, 3, 42);
        cb.on_document_complete("a.pdf", 3);
        cb.on_batch_complete(2, 3);
        cb.on_batch_failed("boom");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_document_start("a.pdf", 2);
        tracker.on_page_transcribed("a.pdf", 0, 2, 10);
        tracker.on_page_transcribed("a.pdf", 1, 2, 12);
        tracker.on_batch_complete(1, 2);

        assert_eq!(tracker.documents.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.pages.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completed_pages.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(1);
    }
}
