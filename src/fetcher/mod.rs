//! The fetcher set: polymorphic retrieval of dependency payloads.
//!
//! One uniform operation - [`FetcherSet::fetch`] - dispatched over the closed
//! set of source kinds:
//!
//! - **Local** paths are validated and returned in place; no caching, no
//!   network, only a content digest for lock consistency checks.
//! - **Git** sources are cloned with the system git binary, checked out at
//!   the declared reference (or the clone's default branch), and the working
//!   tree is stored in the cache; the resolved commit id becomes
//!   `resolved_ref`.
//! - **Archive** sources are downloaded over HTTP, digested, extracted, and
//!   stored in the cache.
//!
//! Before any network call the cache store is consulted under the
//! descriptor's equivalence key; a hit skips the network entirely. This is
//! the mechanism by which replay-from-lock performs zero network access. The
//! per-dependency stdout lines (`fetching ...` vs `using cached dependency
//! for ...`) are emitted here, where hit-vs-miss is actually known, so the
//! messages are always accurate.
//!
//! Network fetches for independent dependencies may run concurrently; a
//! semaphore bounds them. Timeouts surface as fetch failures and are not
//! retried - retry is a caller-level policy.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::archive;
use crate::cache::{CacheStore, EntryMeta};
use crate::core::ProvendError;
use crate::git::{GitRepo, classify_git_error};
use crate::source::{SourceDescriptor, SourceKind};
use crate::utils::fs::{calculate_checksum, calculate_tree_checksum, copy_dir, ensure_dir};

/// Maximum concurrent network fetches.
const FETCH_WORKERS: usize = 4;

/// HTTP transfer timeout, matching the git operation timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Result of fetching one dependency payload.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Ready-to-use payload: a directory for git/archive sources, the
    /// declared path itself (file or directory) for local sources
    pub content_path: PathBuf,
    /// Concrete commit id actually fetched (git sources only)
    pub resolved_ref: Option<String>,
    /// Payload digest, `sha256:` prefixed
    pub digest: String,
}

/// Fetch strategies keyed by source kind, sharing one cache store.
pub struct FetcherSet {
    cache: Arc<CacheStore>,
    network: Semaphore,
    http: reqwest::Client,
    /// Re-fetch cached entries instead of replaying them (overwrite runs)
    refresh: bool,
    /// Keys already refreshed in this run; a key is refreshed at most once so
    /// deduplication still holds under `refresh`
    refreshed: dashmap::DashMap<String, ()>,
    /// Per-run per-key serialization. Without it, a sibling could populate a
    /// key right before the designated refresher re-fetches it, doubling the
    /// fetch for one source.
    run_guards: dashmap::DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl FetcherSet {
    /// Creates a fetcher set over the given cache store.
    pub fn new(cache: Arc<CacheStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            cache,
            network: Semaphore::new(FETCH_WORKERS),
            http,
            refresh: false,
            refreshed: dashmap::DashMap::new(),
            run_guards: dashmap::DashMap::new(),
        })
    }

    /// Enables refresh mode: the first touch of every cache key in this run
    /// re-fetches instead of replaying, so symbolic references (branch heads,
    /// mutable archive URLs) are re-resolved. Subsequent touches of the same
    /// key within the run reuse the refreshed entry.
    #[must_use]
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// The cache store backing this fetcher set.
    #[must_use]
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Fetches the payload for one dependency.
    pub async fn fetch(&self, name: &str, descriptor: &SourceDescriptor) -> Result<Fetched> {
        match descriptor.kind() {
            SourceKind::Local => self.fetch_local(name, descriptor),
            SourceKind::Git => self.fetch_cached(name, descriptor).await,
            SourceKind::Archive => self.fetch_cached(name, descriptor).await,
        }
    }

    fn fetch_local(&self, name: &str, descriptor: &SourceDescriptor) -> Result<Fetched> {
        let path = descriptor.local_path();
        if !path.exists() {
            return Err(ProvendError::UnresolvableSource {
                name: name.to_string(),
                source_locator: descriptor.locator().to_string(),
                reason: "path does not exist".to_string(),
            }
            .into());
        }

        let digest = if path.is_dir() {
            calculate_tree_checksum(&path)?
        } else {
            calculate_checksum(&path)?
        };

        Ok(Fetched {
            content_path: path,
            resolved_ref: None,
            digest: format!("sha256:{digest}"),
        })
    }

    async fn fetch_cached(&self, name: &str, descriptor: &SourceDescriptor) -> Result<Fetched> {
        let key = descriptor.cache_key();
        let locator = descriptor.locator().to_string();

        let run_guard = self
            .run_guards
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _serialized = run_guard.lock().await;

        let populate = |content_dir: PathBuf| async move {
            // Only an actual (or forced) cache miss reaches this point.
            println!("fetching {locator}");
            match descriptor.kind() {
                SourceKind::Git => self.populate_git(name, descriptor, content_dir).await,
                SourceKind::Archive => self.populate_archive(name, descriptor, content_dir).await,
                SourceKind::Local => unreachable!("local sources are never cached"),
            }
        };

        // In refresh mode each key is re-fetched exactly once per run.
        let must_refresh = self.refresh && self.refreshed.insert(key.clone(), ()).is_none();

        let (entry, populated) = if must_refresh {
            (self.cache.repopulate(&key, populate).await?, true)
        } else {
            self.cache.get_or_populate(&key, populate).await?
        };

        if !populated {
            println!("using cached dependency for {}", descriptor.locator());
        }

        Ok(Fetched {
            content_path: entry.payload_path,
            resolved_ref: entry.resolved_ref,
            digest: entry.digest,
        })
    }

    async fn populate_git(
        &self,
        name: &str,
        descriptor: &SourceDescriptor,
        content_dir: PathBuf,
    ) -> Result<EntryMeta> {
        let _permit = self.network.acquire().await.context("fetch semaphore closed")?;
        let locator = descriptor.locator();

        let workdir = tempfile::tempdir().context("Failed to create git staging directory")?;
        let clone_dir = workdir.path().join("repo");

        let repo = GitRepo::clone(locator, &clone_dir)
            .await
            .map_err(|e| classify_git_error(e, name, locator))?;

        // No declared ref means the clone's default branch.
        if let Some(reference) = descriptor.reference() {
            repo.checkout(reference)
                .await
                .map_err(|e| classify_git_error(e, name, locator))?;
        }

        let commit = repo
            .current_commit()
            .await
            .map_err(|e| classify_git_error(e, name, locator))?;

        copy_working_tree(&clone_dir, &content_dir)?;
        let digest = calculate_tree_checksum(&content_dir)?;

        Ok(EntryMeta {
            digest: format!("sha256:{digest}"),
            resolved_ref: Some(commit),
        })
    }

    async fn populate_archive(
        &self,
        name: &str,
        descriptor: &SourceDescriptor,
        content_dir: PathBuf,
    ) -> Result<EntryMeta> {
        let _permit = self.network.acquire().await.context("fetch semaphore closed")?;
        let locator = descriptor.locator();

        let response = self.http.get(locator).send().await.map_err(|e| {
            ProvendError::FetchFailed {
                name: name.to_string(),
                source_locator: locator.to_string(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProvendError::FetchFailed {
                name: name.to_string(),
                source_locator: locator.to_string(),
                reason: format!("server returned {status}"),
            }
            .into());
        }

        let payload = response.bytes().await.map_err(|e| ProvendError::FetchFailed {
            name: name.to_string(),
            source_locator: locator.to_string(),
            reason: e.to_string(),
        })?;

        let digest = {
            let mut hasher = Sha256::new();
            hasher.update(&payload);
            hex::encode(hasher.finalize())
        };

        let workdir = tempfile::tempdir().context("Failed to create download staging directory")?;
        let payload_path = workdir.path().join(archive_file_name(locator));
        std::fs::write(&payload_path, &payload)
            .with_context(|| format!("Failed to write downloaded payload for '{name}'"))?;

        archive::extract(&payload_path, &content_dir)?;

        Ok(EntryMeta {
            digest: format!("sha256:{digest}"),
            resolved_ref: None,
        })
    }
}

/// Copies a git working tree, leaving the `.git` directory behind.
fn copy_working_tree(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;
    for entry in std::fs::read_dir(src)
        .with_context(|| format!("Failed to read working tree: {}", src.display()))?
    {
        let entry = entry?;
        if entry.file_name() == ".git" {
            continue;
        }
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else if entry.file_type()?.is_file() {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Derives a payload file name (used for format detection) from a URL.
fn archive_file_name(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains("://"))
        .map_or_else(|| "payload".to_string(), |segment| {
            // strip query strings: ".../archive.tar.gz?token=x"
            segment.split('?').next().unwrap_or(segment).to_string()
        })
}
