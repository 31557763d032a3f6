//! The cache store: fetch-once, read-many storage for dependency payloads.
//!
//! Fetched payloads (git working trees, extracted archives) are stored under
//! a root directory, one entry per *descriptor equivalence key*:
//!
//! ```text
//! <cache root>/
//! ├── <key>/                 # sha256 of (kind, locator, ref)
//! │   ├── content/           # ready-to-use payload (always a directory)
//! │   └── entry.toml         # digest, resolved_ref, fetched_at
//! ├── .locks/<key>.lock      # cross-process per-key locks
//! └── .staging/              # in-flight entries before atomic rename
//! ```
//!
//! The root defaults to `~/.provend/cache` (override with the
//! `PROVEND_CACHE_DIR` environment variable) and is shared across profiles;
//! a run can point it anywhere via `--vendor-cache`.
//!
//! # At-most-one write per key
//!
//! [`CacheStore::get_or_populate`] guarantees a key is populated at most
//! once even under concurrency:
//! - tasks in the same process serialize on a per-key `tokio::sync::Mutex`
//!   held in a [`DashMap`];
//! - separate processes serialize on an exclusive [`CacheLock`] file lock;
//! - the winner stages the entry in `.staging/` and publishes it with a
//!   single atomic rename, so no reader ever observes a partial entry;
//! - losers re-check under the lock, find the published entry, and skip the
//!   fetch entirely.
//!
//! Entries are never mutated after publication and are made world-readable
//! so that non-privileged consumers (e.g. packaging plugins) can read them.

pub mod lock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cache::lock::CacheLock;
use crate::core::ProvendError;
use crate::utils::fs::{ensure_dir, make_world_readable, remove_dir_all};

/// Name of the per-entry metadata file.
const ENTRY_FILE: &str = "entry.toml";
/// Name of the payload directory inside an entry.
const CONTENT_DIR: &str = "content";

/// Metadata produced by a populate callback for a fresh entry.
pub struct EntryMeta {
    /// Payload digest, `sha256:` prefixed
    pub digest: String,
    /// Concrete commit/version actually fetched, if the source has one
    pub resolved_ref: Option<String>,
}

/// Serialized form of an entry's metadata file.
#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    key: String,
    digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resolved_ref: Option<String>,
    fetched_at: DateTime<Utc>,
}

/// A published cache entry. Immutable.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Descriptor equivalence key
    pub key: String,
    /// Path of the ready-to-use payload directory
    pub payload_path: PathBuf,
    /// Payload digest, `sha256:` prefixed
    pub digest: String,
    /// Concrete resolved reference, if any
    pub resolved_ref: Option<String>,
    /// When the payload was fetched
    pub fetched_at: DateTime<Utc>,
}

/// Content-addressed-by-source-identity storage of fetched payloads.
pub struct CacheStore {
    root: PathBuf,
    key_guards: DashMap<String, Arc<Mutex<()>>>,
}

impl CacheStore {
    /// Opens (creating if needed) a cache store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        ensure_dir(&root).map_err(|e| ProvendError::OutputDirectoryInvalid {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            root,
            key_guards: DashMap::new(),
        })
    }

    /// Opens the default, user-global cache store.
    pub fn open_default() -> Result<Self> {
        Self::new(Self::default_dir()?)
    }

    /// The default cache location: `PROVEND_CACHE_DIR` if set, otherwise
    /// `~/.provend/cache`.
    pub fn default_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("PROVEND_CACHE_DIR") {
            return Ok(PathBuf::from(dir));
        }
        let home = dirs::home_dir().context("Cannot determine home directory for cache")?;
        Ok(home.join(".provend").join("cache"))
    }

    /// The cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Looks up a published entry by key.
    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        self.read_entry(key)
    }

    /// Returns the entry for `key`, populating it at most once.
    ///
    /// When the entry is absent, `populate` is invoked with the path of an
    /// empty staging payload directory to fill; the entry is then published
    /// atomically. When the entry exists (including when another task or
    /// process won the race while we waited on the lock), `populate` is never
    /// invoked. The returned flag is `true` iff this call performed the
    /// population.
    pub async fn get_or_populate<F, Fut>(&self, key: &str, populate: F) -> Result<(CacheEntry, bool)>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: std::future::Future<Output = Result<EntryMeta>>,
    {
        self.populate_inner(key, populate, false).await
    }

    /// Replaces any existing entry for `key`, fetching fresh content.
    ///
    /// Used by explicit re-vendor runs so that symbolic references (branch
    /// heads, mutable archive URLs) are re-resolved instead of replayed. The
    /// old entry is removed and the new one published under the same per-key
    /// locks, so concurrent readers still never observe a partial entry.
    pub async fn repopulate<F, Fut>(&self, key: &str, populate: F) -> Result<CacheEntry>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: std::future::Future<Output = Result<EntryMeta>>,
    {
        let (entry, _) = self.populate_inner(key, populate, true).await?;
        Ok(entry)
    }

    async fn populate_inner<F, Fut>(
        &self,
        key: &str,
        populate: F,
        force: bool,
    ) -> Result<(CacheEntry, bool)>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: std::future::Future<Output = Result<EntryMeta>>,
    {
        // In-process serialization per key
        let guard = self
            .key_guards
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _in_process = guard.lock().await;

        // Cross-process serialization per key
        let _file_lock = CacheLock::acquire(&self.root, key).await?;

        if !force && let Some(entry) = self.read_entry(key)? {
            return Ok((entry, false));
        }

        // Clear any superseded, partial, or malformed entry before
        // publishing a fresh one; we hold both per-key locks here.
        remove_dir_all(&self.root.join(key))?;

        let staging_root = self.root.join(".staging");
        ensure_dir(&staging_root)?;
        let stage = tempfile::Builder::new()
            .prefix(&format!("{key}-"))
            .tempdir_in(&staging_root)
            .with_context(|| format!("Failed to create staging directory under {}", staging_root.display()))?;

        let content_dir = stage.path().join(CONTENT_DIR);
        ensure_dir(&content_dir)?;

        // On error the staging TempDir cleans itself up; nothing is published.
        let meta = populate(content_dir).await?;

        let record = EntryRecord {
            key: key.to_string(),
            digest: meta.digest,
            resolved_ref: meta.resolved_ref,
            fetched_at: Utc::now(),
        };
        let serialized = toml::to_string_pretty(&record)?;
        fs::write(stage.path().join(ENTRY_FILE), serialized)?;

        make_world_readable(stage.path())?;

        let final_dir = self.root.join(key);
        let staged = stage.keep();
        if let Err(e) = fs::rename(&staged, &final_dir) {
            let _ = remove_dir_all(&staged);
            return Err(e)
                .with_context(|| format!("Failed to publish cache entry: {}", final_dir.display()));
        }

        let entry = self
            .read_entry(key)?
            .context("Cache entry vanished immediately after publication")?;
        Ok((entry, true))
    }

    /// Reads an entry without side effects. Anything short of a complete,
    /// parseable entry reads as absent; cleanup happens only under the
    /// per-key locks in [`populate_inner`](Self::populate_inner).
    fn read_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let dir = self.root.join(key);
        let meta_path = dir.join(ENTRY_FILE);
        let payload_path = dir.join(CONTENT_DIR);

        if !meta_path.is_file() || !payload_path.is_dir() {
            return Ok(None);
        }

        let content = fs::read_to_string(&meta_path)
            .with_context(|| format!("Failed to read cache metadata: {}", meta_path.display()))?;
        let Ok(record) = toml::from_str::<EntryRecord>(&content) else {
            return Ok(None);
        };

        Ok(Some(CacheEntry {
            key: record.key,
            payload_path,
            digest: record.digest,
            resolved_ref: record.resolved_ref,
            fetched_at: record.fetched_at,
        }))
    }
}
