//! Chunk store trait and artifact metadata.

use crate::Result;
use crate::io::traits::ByteStream;
use crate::models::JobId;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::PathBuf;

/// A file persisted by a chunk store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkArtifact {
    /// Store key (a sanitized file name).
    pub key: String,
    /// Location on durable storage.
    pub path: PathBuf,
    /// Owning job, absent for staged uploads.
    pub job_id: Option<JobId>,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: u64,
    /// Current size in bytes.
    pub size_bytes: u64,
}

impl ChunkArtifact {
    /// Age of the artifact at `now`, saturating at zero for future timestamps.
    #[must_use]
    pub const fn age_at(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }

    /// Returns `true` if the artifact is strictly older than `threshold_secs`.
    #[must_use]
    pub const fn is_older_than(&self, threshold_secs: u64, now: u64) -> bool {
        self.age_at(now) > threshold_secs
    }
}

/// Durable storage for intermediate import/export artifacts.
///
/// Writers to one key are serialized; writes to distinct keys never contend.
/// `created_at` is recorded when an artifact is first created and is never
/// moved forward by appends.
pub trait ChunkStore: Send + Sync {
    /// Creates or replaces an artifact.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] for unsafe keys and
    /// [`crate::Error::Store`] on I/O failure.
    fn put(&self, key: &str, job_id: Option<&JobId>, bytes: &[u8]) -> Result<ChunkArtifact>;

    /// Appends to an artifact, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] for unsafe keys and
    /// [`crate::Error::Store`] on I/O failure.
    fn append(&self, key: &str, job_id: Option<&JobId>, bytes: &[u8]) -> Result<ChunkArtifact>;

    /// Cuts an artifact back to `len` bytes, keeping its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileNotFound`] if the key does not exist and
    /// [`crate::Error::Store`] on I/O failure.
    fn truncate(&self, key: &str, len: u64) -> Result<ChunkArtifact>;

    /// Opens an artifact for reading.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileNotFound`] if the key does not exist.
    fn get(&self, key: &str) -> Result<ByteStream>;

    /// Returns artifact metadata, or `None` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Store`] if metadata cannot be read.
    fn stat(&self, key: &str) -> Result<Option<ChunkArtifact>>;

    /// Moves an artifact to a new key, keeping its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileNotFound`] if `from` does not exist.
    fn rename(&self, from: &str, to: &str) -> Result<ChunkArtifact>;

    /// Deletes an artifact and its metadata.
    ///
    /// Returns `false` if the artifact was already gone.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Store`] if removal fails.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Lists all artifacts, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Store`] if the store cannot be scanned.
    fn list(&self) -> Result<Vec<ChunkArtifact>>;

    /// Lists artifacts with `now - created_at > threshold_secs`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Store`] if the store cannot be scanned.
    fn list_older_than(&self, threshold_secs: u64, now: u64) -> Result<Vec<ChunkArtifact>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|a| a.is_older_than(threshold_secs, now))
            .collect())
    }

    /// Resolves the on-disk location of a key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] for unsafe keys.
    fn path_of(&self, key: &str) -> Result<PathBuf>;

    /// Copies an uploaded file into the store under `file_name`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] for unsafe names and
    /// [`crate::Error::Store`] on I/O failure.
    fn stage_upload(&self, file_name: &str, reader: &mut dyn Read) -> Result<ChunkArtifact>;
}
