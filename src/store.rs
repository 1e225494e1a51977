//! Bounded result store and per-request upload staging
//!
//! Background-removal outputs are written once, keyed by a server-generated
//! handle, and served to later download requests. The store owns its own
//! directory (never the shared OS temp root), bounds growth with count- and
//! age-based eviction, and never overwrites an entry in place.

use crate::error::{Result, SortiumError};
use instant::{Duration, Instant};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;
use uuid::Uuid;

/// Opaque retrieval handle for a stored result
///
/// Always derived from a freshly generated UUID, never from caller-supplied
/// filenames, so handles cannot collide across concurrent requests or smuggle
/// path components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle(String);

impl Handle {
    fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Parse a handle received from a retrieval request
    ///
    /// # Errors
    /// - `InvalidInput` if the token is not a plausible handle (wrong length
    ///   or non-hexadecimal characters)
    pub fn parse(token: &str) -> Result<Self> {
        let is_plausible = token.len() == 32 && token.bytes().all(|b| b.is_ascii_hexdigit());
        if is_plausible {
            Ok(Self(token.to_string()))
        } else {
            Err(SortiumError::invalid_input(format!(
                "malformed retrieval handle: {token}"
            )))
        }
    }

    /// Handle token as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct StoredEntry {
    path: PathBuf,
    created: Instant,
}

struct StoreIndex {
    entries: HashMap<Handle, StoredEntry>,
    /// Insertion order, oldest first, for count-based eviction
    order: VecDeque<Handle>,
}

/// Bounded, disk-backed store for background-removal results
pub struct ResultStore {
    dir: TempDir,
    index: Mutex<StoreIndex>,
    capacity: usize,
    ttl: Duration,
}

impl ResultStore {
    /// Create a store with the given eviction bounds
    ///
    /// # Errors
    /// - `Storage` if the store's backing directory cannot be created
    pub fn new(capacity: usize, ttl: Duration) -> Result<Self> {
        let dir = TempDir::with_prefix("sortium-results-")
            .map_err(|e| SortiumError::storage("failed to create result store directory", e))?;
        tracing::debug!(dir = %dir.path().display(), capacity, "result store ready");
        Ok(Self {
            dir,
            index: Mutex::new(StoreIndex {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity,
            ttl,
        })
    }

    /// Persist result bytes under a fresh handle
    ///
    /// # Errors
    /// - `Storage` if the bytes cannot be written (disk full, permission)
    pub fn insert(&self, bytes: &[u8]) -> Result<Handle> {
        let handle = Handle::generate();
        let path = self.dir.path().join(format!("{handle}.png"));
        fs::write(&path, bytes).map_err(|e| {
            SortiumError::storage(
                format!("failed to persist result '{}'", path.display()),
                e,
            )
        })?;

        let mut index = self.lock_index()?;
        index.entries.insert(
            handle.clone(),
            StoredEntry {
                path,
                created: Instant::now(),
            },
        );
        index.order.push_back(handle.clone());
        Self::evict(&mut index, self.capacity, self.ttl);
        Ok(handle)
    }

    /// Read back a previously stored result
    ///
    /// The read happens under the index lock so eviction can never unlink an
    /// entry mid-read.
    ///
    /// # Errors
    /// - `NotFound` if the handle is unknown or the entry has been evicted
    pub fn fetch(&self, handle: &Handle) -> Result<Vec<u8>> {
        let mut index = self.lock_index()?;
        Self::evict(&mut index, self.capacity, self.ttl);
        let entry = index
            .entries
            .get(handle)
            .ok_or_else(|| SortiumError::not_found(handle.as_str()))?;
        fs::read(&entry.path).map_err(|_| SortiumError::not_found(handle.as_str()))
    }

    /// Number of live entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_index().map(|index| index.entries.len()).unwrap_or(0)
    }

    /// Whether the store has no live entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_index(&self) -> Result<std::sync::MutexGuard<'_, StoreIndex>> {
        self.index
            .lock()
            .map_err(|_| SortiumError::invalid_config("result store lock poisoned"))
    }

    fn evict(index: &mut StoreIndex, capacity: usize, ttl: Duration) {
        // Age first, then size; order is oldest-first so both scans walk from
        // the front.
        while let Some(oldest) = index.order.front() {
            let expired = index
                .entries
                .get(oldest)
                .is_some_and(|entry| entry.created.elapsed() > ttl);
            let over_capacity = index.entries.len() > capacity;
            if !expired && !over_capacity {
                break;
            }
            if let Some(handle) = index.order.pop_front() {
                if let Some(entry) = index.entries.remove(&handle) {
                    if let Err(e) = fs::remove_file(&entry.path) {
                        log::warn!("failed to remove evicted result '{}': {e}", entry.path.display());
                    }
                    tracing::debug!(%handle, "evicted stored result");
                }
            }
        }
    }
}

/// A per-request upload staged to its own unique path
///
/// Each request gets a fresh file, so concurrent uploads can never clobber
/// each other; the file is removed on drop on every exit path.
pub struct StagedUpload {
    path: PathBuf,
}

impl StagedUpload {
    /// Write upload bytes to a unique file under `dir`
    ///
    /// # Errors
    /// - `Storage` if the staging file cannot be written
    pub fn stage(dir: &Path, bytes: &[u8]) -> Result<Self> {
        let path = dir.join(format!("upload-{}", Uuid::new_v4().simple()));
        fs::write(&path, bytes).map_err(|e| {
            SortiumError::storage(
                format!("failed to stage upload '{}'", path.display()),
                e,
            )
        })?;
        Ok(Self { path })
    }

    /// Path of the staged file, valid for the lifetime of this guard
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("failed to clean staged upload '{}': {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(capacity: usize) -> ResultStore {
        ResultStore::new(capacity, Duration::from_secs(3600)).unwrap()
    }

    #[test]
    fn test_insert_then_fetch_round_trip() {
        let store = store(8);
        let handle = store.insert(b"png bytes").unwrap();
        assert_eq!(store.fetch(&handle).unwrap(), b"png bytes");
    }

    #[test]
    fn test_unknown_handle_is_not_found() {
        let store = store(8);
        let unknown = Handle::parse("0123456789abcdef0123456789abcdef").unwrap();
        let err = store.fetch(&unknown).unwrap_err();
        assert!(matches!(err, SortiumError::NotFound(_)));
    }

    #[test]
    fn test_handles_are_distinct_per_insert() {
        let store = store(8);
        let a = store.insert(b"first").unwrap();
        let b = store.insert(b"second").unwrap();
        assert_ne!(a, b);
        assert_eq!(store.fetch(&a).unwrap(), b"first");
        assert_eq!(store.fetch(&b).unwrap(), b"second");
    }

    #[test]
    fn test_capacity_eviction_drops_oldest() {
        let store = store(2);
        let first = store.insert(b"1").unwrap();
        let second = store.insert(b"2").unwrap();
        let third = store.insert(b"3").unwrap();

        assert_eq!(store.len(), 2);
        assert!(matches!(
            store.fetch(&first).unwrap_err(),
            SortiumError::NotFound(_)
        ));
        assert_eq!(store.fetch(&second).unwrap(), b"2");
        assert_eq!(store.fetch(&third).unwrap(), b"3");
    }

    #[test]
    fn test_ttl_eviction() {
        let store = ResultStore::new(8, Duration::from_millis(10)).unwrap();
        let handle = store.insert(b"short-lived").unwrap();
        std::thread::sleep(Duration::from_millis(30));
        let err = store.fetch(&handle).unwrap_err();
        assert!(matches!(err, SortiumError::NotFound(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_handle_parse_rejects_traversal_tokens() {
        for bad in ["../etc/passwd", "abc", "", "0123456789abcdef0123456789abcdeZ"] {
            assert!(Handle::parse(bad).is_err(), "expected rejection for {bad:?}");
        }
    }

    #[test]
    fn test_staged_upload_cleans_up_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let staged = StagedUpload::stage(dir.path(), b"upload bytes").unwrap();
            assert_eq!(fs::read(staged.path()).unwrap(), b"upload bytes");
            staged.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_staged_uploads_use_unique_paths() {
        let dir = tempfile::tempdir().unwrap();
        let a = StagedUpload::stage(dir.path(), b"a").unwrap();
        let b = StagedUpload::stage(dir.path(), b"b").unwrap();
        assert_ne!(a.path(), b.path());
    }
}
