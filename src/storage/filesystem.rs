//! Filesystem chunk store.
//!
//! Artifacts are plain files under a single directory. Each artifact has a
//! JSON sidecar `<key>.meta` that records the owning job and the creation
//! timestamp, so reclamation does not depend on file modification times.
//!
//! # Security
//!
//! Keys are validated before touching the filesystem: only alphanumerics,
//! `-`, `_` and `.` are allowed, with no leading dot and no `..`, so a key
//! can never escape the store directory.

use super::traits::{ChunkArtifact, ChunkStore};
use crate::io::traits::ByteStream;
use crate::models::JobId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::UNIX_EPOCH;
use tracing::{debug, instrument, warn};

/// Sidecar suffix for artifact metadata.
const META_SUFFIX: &str = ".meta";

/// Maximum key length.
const MAX_KEY_LEN: usize = 200;

/// Serializable sidecar metadata.
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactMeta {
    #[serde(default)]
    job_id: Option<String>,
    created_at: u64,
}

/// Chunk store backed by a local directory.
pub struct FilesystemChunkStore {
    base_path: PathBuf,
    clock: fn() -> u64,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FilesystemChunkStore {
    /// Creates a store rooted at `base_path`, creating the directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the directory cannot be created.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).map_err(|e| Error::store("create_chunk_dir", e))?;
        Ok(Self {
            base_path,
            clock: crate::current_timestamp,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Replaces the clock used for `created_at`.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the base path.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Validates a key for use as a file name.
    fn is_safe_key(key: &str) -> bool {
        !key.is_empty()
            && key.len() <= MAX_KEY_LEN
            && !key.starts_with('.')
            && !key.contains("..")
            && !key.ends_with(META_SUFFIX)
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    }

    fn checked_path(&self, key: &str) -> Result<PathBuf> {
        if !Self::is_safe_key(key) {
            return Err(Error::Validation(format!("invalid chunk key: '{key}'")));
        }
        Ok(self.base_path.join(key))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{key}{META_SUFFIX}"))
    }

    /// Returns the writer lock for one key.
    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Drops the lock entry for `key` unless another caller still holds it.
    ///
    /// Must be called after the key's guard is released.
    fn release_key(&self, key: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let ours = locks.get(key).is_some_and(|held| Arc::ptr_eq(held, lock));
        // One reference in the map, one held by the caller.
        if ours && Arc::strong_count(lock) == 2 {
            locks.remove(key);
        }
    }

    fn write_meta(&self, key: &str, job_id: Option<&JobId>) -> Result<()> {
        let meta = ArtifactMeta {
            job_id: job_id.map(ToString::to_string),
            created_at: (self.clock)(),
        };
        let json = serde_json::to_vec(&meta).map_err(|e| Error::store("serialize_meta", e))?;
        fs::write(self.meta_path(key), json).map_err(|e| Error::store("write_meta", e))
    }

    fn read_meta(&self, key: &str) -> Option<ArtifactMeta> {
        let bytes = fs::read(self.meta_path(key)).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(key, error = %e, "Ignoring unreadable chunk metadata");
                None
            },
        }
    }

    fn artifact(&self, key: &str, path: PathBuf) -> Result<Option<ChunkArtifact>> {
        let metadata = match fs::metadata(&path) {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::store("stat", e)),
        };

        let (job_id, created_at) = match self.read_meta(key) {
            Some(meta) => (meta.job_id.map(JobId::new), meta.created_at),
            None => {
                let mtime = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map_or(0, |d| d.as_secs());
                (None, mtime)
            },
        };

        Ok(Some(ChunkArtifact {
            key: key.to_string(),
            path,
            job_id,
            created_at,
            size_bytes: metadata.len(),
        }))
    }

    fn existing(&self, key: &str, path: PathBuf) -> Result<ChunkArtifact> {
        self.artifact(key, path)?
            .ok_or_else(|| Error::FileNotFound(key.to_string()))
    }

    /// Moves data and sidecar; both key locks must be held.
    fn rename_locked(
        &self,
        from: &str,
        from_path: &Path,
        to: &str,
        to_path: PathBuf,
    ) -> Result<ChunkArtifact> {
        match fs::rename(from_path, &to_path) {
            Ok(()) => {},
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound(from.to_string()));
            },
            Err(e) => return Err(Error::store("rename", e)),
        }
        match fs::rename(self.meta_path(from), self.meta_path(to)) {
            Ok(()) => {},
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // No sidecar to carry over; drop a stale one at the target.
                remove_if_exists(&self.meta_path(to))
                    .map_err(|e| Error::store("rename_meta", e))?;
            },
            Err(e) => return Err(Error::store("rename_meta", e)),
        }
        self.existing(to, to_path)
    }

    /// Removes data and sidecar; the key lock must be held.
    fn delete_locked(&self, key: &str, path: &Path) -> Result<bool> {
        let removed = match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(Error::store("delete", e)),
        };
        remove_if_exists(&self.meta_path(key)).map_err(|e| Error::store("delete_meta", e))?;
        debug!(key, removed, "Deleted chunk artifact");
        Ok(removed)
    }
}

/// Removes a file, treating a missing file as success.
fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

impl ChunkStore for FilesystemChunkStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    fn put(&self, key: &str, job_id: Option<&JobId>, bytes: &[u8]) -> Result<ChunkArtifact> {
        let path = self.checked_path(key)?;
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        fs::write(&path, bytes).map_err(|e| Error::store("put", e))?;
        self.write_meta(key, job_id)?;
        self.existing(key, path)
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    fn append(&self, key: &str, job_id: Option<&JobId>, bytes: &[u8]) -> Result<ChunkArtifact> {
        let path = self.checked_path(key)?;
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let created = !path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::store("append", e))?;
        file.write_all(bytes)
            .and_then(|()| file.flush())
            .map_err(|e| Error::store("append", e))?;
        if created {
            self.write_meta(key, job_id)?;
        }
        self.existing(key, path)
    }

    #[instrument(skip(self))]
    fn truncate(&self, key: &str, len: u64) -> Result<ChunkArtifact> {
        let path = self.checked_path(key)?;
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let file = match OpenOptions::new().write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound(key.to_string()));
            },
            Err(e) => return Err(Error::store("truncate", e)),
        };
        file.set_len(len).map_err(|e| Error::store("truncate", e))?;
        self.existing(key, path)
    }

    fn get(&self, key: &str) -> Result<ByteStream> {
        let path = self.checked_path(key)?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::FileNotFound(key.to_string()))
            },
            Err(e) => Err(Error::store("get", e)),
        }
    }

    fn stat(&self, key: &str) -> Result<Option<ChunkArtifact>> {
        let path = self.checked_path(key)?;
        self.artifact(key, path)
    }

    #[instrument(skip(self))]
    fn rename(&self, from: &str, to: &str) -> Result<ChunkArtifact> {
        let from_path = self.checked_path(from)?;
        let to_path = self.checked_path(to)?;
        if from == to {
            return self.existing(from, from_path);
        }

        // Both keys are locked, always in key order.
        let (first, second) = if from < to { (from, to) } else { (to, from) };
        let first_lock = self.key_lock(first);
        let second_lock = self.key_lock(second);
        let renamed = {
            let _first = first_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let _second = second_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.rename_locked(from, &from_path, to, to_path)
        };

        let from_lock = if first == from { &first_lock } else { &second_lock };
        self.release_key(from, from_lock);
        renamed
    }

    #[instrument(skip(self))]
    fn delete(&self, key: &str) -> Result<bool> {
        let path = self.checked_path(key)?;
        let lock = self.key_lock(key);
        let removed = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.delete_locked(key, &path)
        };
        self.release_key(key, &lock);
        removed
    }

    fn list(&self) -> Result<Vec<ChunkArtifact>> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| Error::store("list", e))?;

        let mut artifacts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::store("list", e))?;
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            if !Self::is_safe_key(&name) {
                continue;
            }
            if let Some(artifact) = self.artifact(&name, entry.path())? {
                artifacts.push(artifact);
            }
        }
        artifacts.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(artifacts)
    }

    fn path_of(&self, key: &str) -> Result<PathBuf> {
        self.checked_path(key)
    }

    #[instrument(skip(self, reader))]
    fn stage_upload(&self, file_name: &str, reader: &mut dyn Read) -> Result<ChunkArtifact> {
        let path = self.checked_path(file_name)?;
        let lock = self.key_lock(file_name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut file = File::create(&path).map_err(|e| Error::store("stage_upload", e))?;
        io::copy(reader, &mut file).map_err(|e| Error::store("stage_upload", e))?;
        file.flush().map_err(|e| Error::store("stage_upload", e))?;
        self.write_meta(file_name, None)?;
        self.existing(file_name, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn store() -> (TempDir, FilesystemChunkStore) {
        let dir = TempDir::new().unwrap();
        let store = FilesystemChunkStore::new(dir.path()).unwrap();
        (dir, store)
    }

    fn read_all(store: &FilesystemChunkStore, key: &str) -> Vec<u8> {
        let mut out = Vec::new();
        store.get(key).unwrap().read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_safe_keys() {
        assert!(FilesystemChunkStore::is_safe_key("users.csv"));
        assert!(FilesystemChunkStore::is_safe_key("0190abc_def-1.part"));
        assert!(!FilesystemChunkStore::is_safe_key(""));
        assert!(!FilesystemChunkStore::is_safe_key("../etc/passwd"));
        assert!(!FilesystemChunkStore::is_safe_key("a/b.csv"));
        assert!(!FilesystemChunkStore::is_safe_key(".hidden"));
        assert!(!FilesystemChunkStore::is_safe_key("a..b"));
        assert!(!FilesystemChunkStore::is_safe_key("job.meta"));
        assert!(!FilesystemChunkStore::is_safe_key("a b.csv"));
    }

    #[test]
    fn test_put_get_stat() {
        let (_dir, store) = store();
        let job_id = JobId::new("job1");
        let artifact = store.put("job1.csv", Some(&job_id), b"id\n1\n").unwrap();

        assert_eq!(artifact.size_bytes, 5);
        assert_eq!(artifact.job_id, Some(job_id));
        assert_eq!(read_all(&store, "job1.csv"), b"id\n1\n");
        assert!(store.stat("missing.csv").unwrap().is_none());
    }

    #[test]
    fn test_invalid_key_rejected() {
        let (_dir, store) = store();
        let err = store.put("../escape", None, b"x").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_get_missing_is_file_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.get("nope.csv"),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_append_keeps_created_at() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemChunkStore::new(dir.path())
            .unwrap()
            .with_clock(|| 1_000);
        store.append("j.part", None, b"a").unwrap();

        let store = FilesystemChunkStore::new(dir.path())
            .unwrap()
            .with_clock(|| 9_000);
        let artifact = store.append("j.part", None, b"b").unwrap();

        assert_eq!(artifact.created_at, 1_000);
        assert_eq!(artifact.size_bytes, 2);
        assert_eq!(read_all(&store, "j.part"), b"ab");
    }

    #[test]
    fn test_rename_moves_metadata() {
        let (_dir, store) = store();
        let job_id = JobId::new("j");
        store.put("j.part", Some(&job_id), b"data").unwrap();

        let artifact = store.rename("j.part", "j.csv").unwrap();
        assert_eq!(artifact.key, "j.csv");
        assert_eq!(artifact.job_id, Some(job_id));
        assert!(store.stat("j.part").unwrap().is_none());
    }

    #[test]
    fn test_truncate_keeps_prefix_and_metadata() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemChunkStore::new(dir.path())
            .unwrap()
            .with_clock(|| 1_000);
        store.put("j.part", None, b"id\n1\n").unwrap();
        store.append("j.part", None, b"2\n").unwrap();

        let artifact = store.truncate("j.part", 5).unwrap();
        assert_eq!(artifact.size_bytes, 5);
        assert_eq!(artifact.created_at, 1_000);
        assert_eq!(read_all(&store, "j.part"), b"id\n1\n");
        assert!(matches!(
            store.truncate("missing.part", 0),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_rename_over_target_without_sidecar() {
        let (_dir, store) = store();
        store.put("j.csv", Some(&JobId::new("old")), b"old").unwrap();
        fs::write(store.base_path().join("j.part"), b"new").unwrap();

        let artifact = store.rename("j.part", "j.csv").unwrap();
        assert_eq!(artifact.job_id, None);
        assert_eq!(read_all(&store, "j.csv"), b"new");
        assert!(!store.meta_path("j.csv").exists());
    }

    #[test]
    fn test_lock_entries_are_released() {
        let (_dir, store) = store();
        store.put("a.part", None, b"1").unwrap();
        store.rename("a.part", "a.csv").unwrap();
        store.delete("a.csv").unwrap();

        let locks = store.locks.lock().unwrap();
        assert!(!locks.contains_key("a.part"));
        assert!(!locks.contains_key("a.csv"));
    }

    #[test]
    fn test_delete_and_list() {
        let (_dir, store) = store();
        store.put("b.csv", None, b"1").unwrap();
        store.put("a.csv", None, b"2").unwrap();

        let keys: Vec<_> = store.list().unwrap().into_iter().map(|a| a.key).collect();
        assert_eq!(keys, vec!["a.csv", "b.csv"]);

        assert!(store.delete("a.csv").unwrap());
        assert!(!store.delete("a.csv").unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
        assert!(!store.meta_path("a.csv").exists());
    }

    #[test]
    fn test_list_older_than() {
        let dir = TempDir::new().unwrap();
        let old = FilesystemChunkStore::new(dir.path())
            .unwrap()
            .with_clock(|| 100);
        old.put("old.csv", None, b"x").unwrap();
        let fresh = FilesystemChunkStore::new(dir.path())
            .unwrap()
            .with_clock(|| 500);
        fresh.put("fresh.csv", None, b"x").unwrap();

        let stale = fresh.list_older_than(300, 500).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].key, "old.csv");
    }

    #[test]
    fn test_stage_upload() {
        let (_dir, store) = store();
        let mut reader: &[u8] = b"id,name\n1,a\n";
        let artifact = store.stage_upload("users.csv", &mut reader).unwrap();
        assert_eq!(artifact.size_bytes, 12);
        assert!(artifact.job_id.is_none());
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        let (_dir, store) = store();
        let store = Arc::new(store);
        let chunk = vec![b'x'; 4096];

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let chunk = chunk.clone();
                thread::spawn(move || store.append("same.part", None, &chunk).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(read_all(&store, "same.part").len(), 8 * 4096);
    }
}
