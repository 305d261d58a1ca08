//! Vector index: identifier → (embedding, page text, metadata).
//!
//! The [`VectorStore`] trait is the seam between the pipelines and whatever
//! holds the vectors. [`InMemoryVectorStore`] is the process-lifetime backend
//! used by the service: a `HashMap` behind a `RwLock`, searched by brute-force
//! cosine similarity. That is plenty for the handful of documents this crate
//! targets (a resume, a few reports).
//!
//! ## Identity guard
//!
//! Vectors from different embedding models live in different spaces, so
//! comparing them is meaningless even when the dimensions happen to agree.
//! The store adopts the model name and dimension of the first entry it
//! commits and rejects anything else afterwards.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use tracing::debug;

/// Vector-store faults.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding model mismatch: index was built with '{expected}', got '{actual}'")]
    ModelMismatch { expected: String, actual: String },

    #[error("Index lock poisoned")]
    LockPoisoned,
}

/// An embedding vector tagged with the model that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub model: String,
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(model: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            model: model.into(),
            values,
        }
    }

    pub fn dims(&self) -> usize {
        self.values.len()
    }
}

/// Metadata stored alongside each entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub filename: String,
}

/// The unit stored in the index: one transcribed page.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub embedding: Embedding,
    pub document_text: String,
    pub metadata: EntryMetadata,
}

/// A query hit, best first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedEntry {
    pub id: String,
    pub score: f32,
    pub document_text: String,
    pub metadata: EntryMetadata,
}

/// Index identifier for a page: `{filename}_page_{page_index}`.
///
/// Zero-based, unpadded. Deterministic on purpose: re-ingesting the same
/// filename lands on the same identifiers and overwrites the old entries.
pub fn entry_id(filename: &str, page_index: usize) -> String {
    format!("{}_page_{}", filename, page_index)
}

/// Abstract vector storage.
///
/// All methods are async so that remote stores fit behind the same trait;
/// the in-memory implementation returns immediately-ready futures.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or silently overwrite the entry at `entry.id`.
    async fn upsert(&self, entry: IndexEntry) -> Result<(), IndexError>;

    /// Insert or overwrite every entry, or none of them.
    async fn upsert_batch(&self, entries: Vec<IndexEntry>) -> Result<(), IndexError>;

    /// Up to `k` entries most similar to `query`, best first.
    ///
    /// An empty store yields an empty `Vec`, never an error.
    async fn query(&self, query: &Embedding, k: usize) -> Result<Vec<RetrievedEntry>, IndexError>;

    /// Fetch a single entry by identifier.
    async fn get(&self, id: &str) -> Result<Option<IndexEntry>, IndexError>;

    /// Number of stored entries.
    async fn len(&self) -> Result<usize, IndexError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Identity {
    model: String,
    dims: usize,
}

impl Identity {
    fn of(embedding: &Embedding) -> Self {
        Self {
            model: embedding.model.clone(),
            dims: embedding.dims(),
        }
    }

    fn check(&self, embedding: &Embedding) -> Result<(), IndexError> {
        if embedding.model != self.model {
            return Err(IndexError::ModelMismatch {
                expected: self.model.clone(),
                actual: embedding.model.clone(),
            });
        }
        if embedding.dims() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                actual: embedding.dims(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
struct Inner {
    identity: Option<Identity>,
    entries: HashMap<String, IndexEntry>,
}

/// In-memory vector store with process lifetime.
#[derive(Default)]
pub struct InMemoryVectorStore {
    inner: RwLock<Inner>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty, zero or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, entry: IndexEntry) -> Result<(), IndexError> {
        self.upsert_batch(vec![entry]).await
    }

    async fn upsert_batch(&self, entries: Vec<IndexEntry>) -> Result<(), IndexError> {
        let Some(first) = entries.first() else {
            return Ok(());
        };

        let mut inner = self.inner.write().map_err(|_| IndexError::LockPoisoned)?;

        // Validate the whole batch before touching the map.
        let identity = inner
            .identity
            .clone()
            .unwrap_or_else(|| Identity::of(&first.embedding));
        for entry in &entries {
            identity.check(&entry.embedding)?;
        }

        let count = entries.len();
        for entry in entries {
            inner.entries.insert(entry.id.clone(), entry);
        }
        inner.identity = Some(identity);

        debug!("Committed {} entries ({} total)", count, inner.entries.len());
        Ok(())
    }

    async fn query(&self, query: &Embedding, k: usize) -> Result<Vec<RetrievedEntry>, IndexError> {
        let inner = self.inner.read().map_err(|_| IndexError::LockPoisoned)?;

        let Some(identity) = inner.identity.as_ref() else {
            return Ok(Vec::new());
        };
        identity.check(query)?;

        let mut hits: Vec<RetrievedEntry> = inner
            .entries
            .values()
            .map(|entry| RetrievedEntry {
                id: entry.id.clone(),
                score: cosine_similarity(&query.values, &entry.embedding.values),
                document_text: entry.document_text.clone(),
                metadata: entry.metadata.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn get(&self, id: &str) -> Result<Option<IndexEntry>, IndexError> {
        let inner = self.inner.read().map_err(|_| IndexError::LockPoisoned)?;
        Ok(inner.entries.get(id).cloned())
    }

    async fn len(&self) -> Result<usize, IndexError> {
        let inner = self.inner.read().map_err(|_| IndexError::LockPoisoned)?;
        Ok(inner.entries.len())
    }
}
