//! Request and response types for the two external operations.
//!
//! [`IngestDocument`] goes in, [`IngestReport`] comes out of an ingest call;
//! a question goes in and [`QueryAnswer`] comes out of a query.
//! [`DocumentTranscription`] is both the per-document ingest product and the
//! element type of the persisted snapshot, so its serde shape is a wire format:
//! `{ "filename": string, "pages": [string, ...] }`.

use crate::index::RetrievedEntry;
use serde::{Deserialize, Serialize};

/// Acknowledgment text returned by a successful ingest.
pub const INGEST_ACK: &str = "Files processed successfully";

/// A named PDF submitted for ingestion. The bytes are consumed once and not retained.
#[derive(Debug, Clone)]
pub struct IngestDocument {
    /// Grouping key for the document's pages. Not required to be unique:
    /// re-ingesting a filename overwrites its entries.
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl IngestDocument {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Transcribed text of every page of one document, in page order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTranscription {
    pub filename: String,
    pub pages: Vec<String>,
}

/// Per-document line of an [`IngestReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub filename: String,
    pub pages: usize,
}

/// Outcome of a successful ingest batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    /// Documents in upload order.
    pub documents: Vec<DocumentSummary>,
    /// Index entries written (one per page).
    pub total_pages: usize,
    /// Wall-clock time of the whole batch.
    pub duration_ms: u64,
}

impl IngestReport {
    /// The acknowledgment returned to callers of the ingest operation.
    pub fn message(&self) -> &'static str {
        INGEST_ACK
    }
}

/// A grounded answer plus the documents it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    /// Generated answer text, unmodified.
    pub response: String,
    /// Deduplicated filenames of the retrieved entries, in first-seen rank order.
    pub sources: Vec<String>,
    /// The context string sent to the text model.
    #[serde(skip)]
    pub context: String,
    /// Retrieved entries, best match first.
    #[serde(skip)]
    pub matches: Vec<RetrievedEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcription_serialises_to_snapshot_shape() {
        let t = DocumentTranscription {
            filename: "resume.pdf".into(),
            pages: vec!["Name: Jane Doe".into(), "Skills: Go, Rust".into()],
        };
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "filename": "resume.pdf",
                "pages": ["Name: Jane Doe", "Skills: Go, Rust"]
            })
        );
    }

    #[test]
    fn query_answer_exposes_only_response_and_sources() {
        let answer = QueryAnswer {
            response: "Jane Doe".into(),
            sources: vec!["resume.pdf".into()],
            context: "Name: Jane Doe".into(),
            matches: Vec::new(),
        };
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "response": "Jane Doe", "sources": ["resume.pdf"] })
        );
    }

    #[test]
    fn report_message_is_fixed_ack() {
        let report = IngestReport {
            documents: vec![],
            total_pages: 0,
            duration_ms: 0,
        };
        assert_eq!(report.message(), "Files processed successfully");
    }
}
