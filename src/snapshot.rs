//! Persisted snapshot of the most recent ingest batch.
//!
//! The snapshot is a pretty-printed JSON array of
//! [`DocumentTranscription`] objects, replaced wholesale by every successful
//! batch. Writes go through a hidden sibling (`.<name>.tmp`) and a rename, so
//! readers see either the previous batch or the new one, never a torn file.
//! The static file server refuses dot-prefixed paths, so the staged file is
//! never downloadable.

use crate::error::RagError;
use crate::output::DocumentTranscription;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Location of the snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = std::ffi::OsString::from(".");
        if let Some(file) = self.path.file_name() {
            name.push(file);
        }
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Serialise `batch` next to the snapshot without replacing it yet.
    pub async fn stage(&self, batch: &[DocumentTranscription]) -> Result<StagedSnapshot, RagError> {
        let json = serde_json::to_string_pretty(batch)
            .map_err(|e| RagError::Internal(format!("snapshot serialisation: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| RagError::SnapshotWrite {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| RagError::SnapshotWrite {
                path: tmp.clone(),
                source,
            })?;
        debug!("Staged snapshot of {} document(s) → {}", batch.len(), tmp.display());

        Ok(StagedSnapshot {
            tmp,
            target: self.path.clone(),
        })
    }

    /// Read the current snapshot. `Ok(None)` when none has been written yet.
    pub async fn load(&self) -> Result<Option<Vec<DocumentTranscription>>, RagError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RagError::SnapshotRead {
                    path: self.path.clone(),
                    detail: e.to_string(),
                })
            }
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| RagError::SnapshotRead {
                path: self.path.clone(),
                detail: e.to_string(),
            })
    }
}

/// A written but not yet visible snapshot.
#[derive(Debug)]
#[must_use = "a staged snapshot must be committed or discarded"]
pub struct StagedSnapshot {
    tmp: PathBuf,
    target: PathBuf,
}

impl StagedSnapshot {
    /// Atomically replace the previous snapshot.
    pub async fn commit(self) -> Result<(), RagError> {
        tokio::fs::rename(&self.tmp, &self.target)
            .await
            .map_err(|source| RagError::SnapshotWrite {
                path: self.target.clone(),
                source,
            })?;
        debug!("Snapshot committed → {}", self.target.display());
        Ok(())
    }

    /// Drop the staged file, leaving the previous snapshot in place.
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_file(&self.tmp).await {
            warn!("Could not remove staged snapshot {}: {}", self.tmp.display(), e);
        }
    }
}
