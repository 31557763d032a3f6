//! Source descriptors: normalized identity for dependency sources.
//!
//! A [`SourceDescriptor`] is the normalized representation of one dependency
//! declaration: its kind (local path, git repository, or remote archive), its
//! locator, and an optional reference. All normalization happens once, at
//! construction time - local paths are tilde-expanded, separator-unified,
//! made absolute against the declaring profile, and lexically folded; URLs
//! are canonicalized - so that descriptor equivalence and the derived cache
//! key compare correctly everywhere downstream.
//!
//! Two descriptors are *equivalent* iff kind, locator, and reference are
//! equal after normalization. Equivalence is the identity used to deduplicate
//! fetches and to address the cache: [`SourceDescriptor::cache_key`] is the
//! SHA-256 of that triple.
//!
//! The set of source kinds is closed and known at design time, so dispatch is
//! a plain enum match rather than dynamic dispatch.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::core::ProvendError;
use crate::profile::DependencyDecl;
use crate::utils::fs::normalize_path;
use crate::utils::platform::normalize_separators;

/// The closed set of dependency source kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A path on the local filesystem
    Local,
    /// A git repository
    Git,
    /// A remote tar/zip archive
    Archive,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Git => write!(f, "git"),
            Self::Archive => write!(f, "archive"),
        }
    }
}

/// Normalized representation of one dependency source. Immutable once created.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    kind: SourceKind,
    locator: String,
    reference: Option<String>,
    options: BTreeMap<String, String>,
}

impl SourceDescriptor {
    /// Builds a descriptor for a local path source.
    ///
    /// The locator is tilde-expanded, separator-unified, made absolute, and
    /// lexically normalized. Relative locators resolve against `base_dir`
    /// (the declaring profile's directory), falling back to the current
    /// working directory when nothing exists at the profile-relative
    /// location. Existence is otherwise checked at fetch time, not here, so
    /// descriptors for error reporting can always be built.
    pub fn local(locator: &str, base_dir: &Path) -> Self {
        let expanded = shellexpand::tilde(&normalize_separators(locator)).into_owned();
        let candidate = PathBuf::from(expanded);
        let absolute = if candidate.is_absolute() {
            candidate
        } else {
            let from_base = base_dir.join(&candidate);
            if from_base.exists() {
                from_base
            } else {
                std::env::current_dir()
                    .ok()
                    .map(|cwd| cwd.join(&candidate))
                    .filter(|from_cwd| from_cwd.exists())
                    .unwrap_or(from_base)
            }
        };

        Self {
            kind: SourceKind::Local,
            locator: normalize_path(&absolute).to_string_lossy().into_owned(),
            reference: None,
            options: BTreeMap::new(),
        }
    }

    /// Builds a descriptor for a git repository source.
    pub fn git(url: &str, reference: Option<&str>) -> Self {
        Self {
            kind: SourceKind::Git,
            locator: canonicalize_url(url),
            reference: reference.map(str::to_string),
            options: BTreeMap::new(),
        }
    }

    /// Builds a descriptor for a remote archive source.
    pub fn archive(url: &str) -> Self {
        Self {
            kind: SourceKind::Archive,
            locator: canonicalize_url(url),
            reference: None,
            options: BTreeMap::new(),
        }
    }

    /// Builds a descriptor from a raw lockfile record. No re-normalization:
    /// lockfiles store already-normalized locators.
    #[must_use]
    pub fn from_parts(kind: SourceKind, locator: String, reference: Option<String>) -> Self {
        Self {
            kind,
            locator,
            reference,
            options: BTreeMap::new(),
        }
    }

    /// Builds the descriptor for a dependency declaration, resolving local
    /// paths against `base_dir` (the directory of the declaring profile).
    pub fn from_decl(decl: &DependencyDecl, base_dir: &Path) -> anyhow::Result<Self> {
        let mut descriptor = if let Some(path) = &decl.path {
            Self::local(path, base_dir)
        } else if let Some(url) = &decl.git {
            Self::git(url, decl.effective_ref())
        } else if let Some(url) = &decl.url {
            Self::archive(url)
        } else {
            // Metadata validation rejects this earlier; keep the error typed.
            return Err(ProvendError::UnresolvableSource {
                name: decl.name.clone(),
                source_locator: String::new(),
                reason: "no source declared".to_string(),
            }
            .into());
        };
        descriptor.options = decl.options.clone();
        Ok(descriptor)
    }

    /// The source kind.
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        self.kind
    }

    /// The normalized locator: an absolute path for local sources, a
    /// canonical URL otherwise.
    #[must_use]
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// The symbolic reference declared for git sources, if any.
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// Additional declaration options. Not part of descriptor equivalence.
    #[must_use]
    pub const fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// The locator as a filesystem path. Only meaningful for local sources.
    #[must_use]
    pub fn local_path(&self) -> PathBuf {
        PathBuf::from(&self.locator)
    }

    /// Whether payloads for this descriptor live in the cache store.
    ///
    /// Local sources are read in place and never cached.
    #[must_use]
    pub const fn is_cacheable(&self) -> bool {
        !matches!(self.kind, SourceKind::Local)
    }

    /// The equivalence key: SHA-256 over `(kind, locator, reference)`.
    ///
    /// This is the cache key and the identity used for fetch deduplication
    /// and cycle detection.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.kind.to_string());
        hasher.update([0u8]);
        hasher.update(&self.locator);
        hasher.update([0u8]);
        if let Some(reference) = &self.reference {
            hasher.update(reference);
        }
        hex::encode(hasher.finalize())
    }
}

// Equivalence is (kind, locator, reference); options carry declaration
// extras and do not participate in identity.
impl PartialEq for SourceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.locator == other.locator
            && self.reference == other.reference
    }
}

impl Eq for SourceDescriptor {}

impl Hash for SourceDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.locator.hash(state);
        self.reference.hash(state);
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            Some(reference) => write!(f, "{} {} @ {}", self.kind, self.locator, reference),
            None => write!(f, "{} {}", self.kind, self.locator),
        }
    }
}

/// Canonicalizes a remote locator: trims whitespace, strips trailing slashes,
/// and lowercases the scheme and host so that casing differences don't split
/// the cache.
fn canonicalize_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');

    match trimmed.split_once("://") {
        Some((scheme, rest)) => {
            let (host, path) = match rest.split_once('/') {
                Some((host, path)) => (host.to_lowercase(), format!("/{path}")),
                None => (rest.to_lowercase(), String::new()),
            };
            format!("{}://{host}{path}", scheme.to_lowercase())
        }
        // scp-style git locators (git@host:path) and bare paths pass through
        None => trimmed.to_string(),
    }
}
