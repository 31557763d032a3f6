//! File locking for cache entries.
//!
//! Provides process-safe exclusive locks scoped to a single cache key, so
//! that two provend processes racing to populate the same entry serialize
//! instead of duplicating the fetch. Locks are released when the returned
//! guard is dropped.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// An exclusive lock for one cache key.
///
/// Lock files live in `<cache>/.locks/<key>.lock`. The lock is held for the
/// lifetime of this value and released on drop; the lock file itself is left
/// in place for reuse.
pub struct CacheLock {
    _file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Acquires an exclusive lock for `key` under `cache_dir`, blocking (off
    /// the async runtime, via `spawn_blocking`) until any other holder
    /// releases it.
    pub async fn acquire(cache_dir: &Path, key: &str) -> Result<Self> {
        let locks_dir = cache_dir.join(".locks");
        tokio::fs::create_dir_all(&locks_dir)
            .await
            .with_context(|| format!("Failed to create locks directory: {}", locks_dir.display()))?;

        let lock_path = locks_dir.join(format!("{key}.lock"));
        let lock_path_clone = lock_path.clone();
        let key = key.to_string();

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&lock_path_clone)
                .with_context(|| {
                    format!("Failed to open lock file: {}", lock_path_clone.display())
                })?;

            file.lock_exclusive()
                .with_context(|| format!("Failed to acquire lock for cache key: {key}"))?;

            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        Ok(Self {
            _file: file,
            path: lock_path,
        })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = self._file.unlock() {
            tracing::warn!("Failed to unlock {}: {e}", self.path.display());
        }
    }
}
