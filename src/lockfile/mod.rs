//! Lockfile management for network-free replay.
//!
//! The lockfile (`provend.lock`) records exactly which dependency sources
//! were resolved during a vendoring run: for every dependency, its normalized
//! source descriptor, the concrete reference that was fetched (for git
//! sources), and the payload digest. With the lockfile and a warm cache,
//! later operations never touch the network.
//!
//! # Format
//!
//! TOML with a stable field order, human-diffable:
//!
//! ```toml
//! # Auto-generated lockfile - DO NOT EDIT
//! version = 1
//!
//! [[dependencies]]
//! name = "ssh-hardening"
//! kind = "git"
//! locator = "https://example.com/ssh-baseline.git"
//! ref = "v2.0.0"
//! resolved_ref = "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1b2"
//! digest = "sha256:0f343b0931126a20f133d67c2b018a3b..."
//!
//! [[dependencies]]
//! name = "shared-controls"
//! kind = "local"
//! locator = "/profiles/shared-controls"
//! digest = "sha256:9f86d081884c7d659a2feaa0c55ad015..."
//! ```
//!
//! Entries appear in resolution order (declaration order, depth-first);
//! nested dependencies are namespaced `parent/child`. Optional fields are
//! omitted entirely, keeping diffs stable. Round-trip law:
//! `read(write(x)) == x` for any valid entry set.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::ProvendError;
use crate::profile::Metadata;
use crate::source::{SourceDescriptor, SourceKind};
use crate::utils::fs::atomic_write;

/// Fixed lockfile name, relative to the profile root.
pub const LOCKFILE_NAME: &str = "provend.lock";

/// One resolved dependency record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockEntry {
    /// Dependency name; nested dependencies are namespaced `parent/child`
    pub name: String,
    /// Source kind of the descriptor
    pub kind: SourceKind,
    /// Normalized source locator
    pub locator: String,
    /// Symbolic reference as declared (git sources only)
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Concrete commit/version actually fetched, when distinct from `ref`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_ref: Option<String>,
    /// Payload digest, `sha256:` prefixed
    pub digest: String,
}

impl LockEntry {
    /// Reconstructs the source descriptor recorded in this entry.
    #[must_use]
    pub fn descriptor(&self) -> SourceDescriptor {
        SourceDescriptor::from_parts(self.kind, self.locator.clone(), self.reference.clone())
    }

    /// Whether this is a top-level (non-namespaced) dependency.
    #[must_use]
    pub fn is_top_level(&self) -> bool {
        !self.name.contains('/')
    }
}

/// The serialized resolution result of one profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockFile {
    /// Lockfile format version
    pub version: u32,
    /// Resolved dependencies, in resolution order
    #[serde(default, rename = "dependencies", skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<LockEntry>,
}

impl Default for LockFile {
    fn default() -> Self {
        Self::new()
    }
}

impl LockFile {
    /// Current lockfile format version.
    pub const CURRENT_VERSION: u32 = 1;

    /// Creates an empty lockfile.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: Vec::new(),
        }
    }

    /// Creates a lockfile from resolved entries.
    #[must_use]
    pub const fn with_entries(entries: Vec<LockEntry>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries,
        }
    }

    /// Loads a lockfile from disk.
    ///
    /// A missing or empty file yields an empty lockfile (not an error);
    /// unparseable content or an unsupported format version yields
    /// [`ProvendError::LockfileCorrupt`], which callers treat as "no valid
    /// existing state".
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Cannot read lockfile: {}", path.display()))?;

        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let lockfile: Self =
            toml::from_str(&content).map_err(|e| ProvendError::LockfileCorrupt {
                file: path.display().to_string(),
                reason: e.to_string(),
            })?;

        if lockfile.version > Self::CURRENT_VERSION {
            return Err(ProvendError::LockfileCorrupt {
                file: path.display().to_string(),
                reason: format!(
                    "lockfile version {} is newer than supported version {}",
                    lockfile.version,
                    Self::CURRENT_VERSION
                ),
            }
            .into());
        }

        Ok(lockfile)
    }

    /// Saves the lockfile atomically, with the standard header comment.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content = String::from("# Auto-generated lockfile - DO NOT EDIT\n");
        content.push_str(&toml::to_string_pretty(self)?);

        atomic_write(path, content.as_bytes())
            .with_context(|| format!("Cannot write lockfile: {}", path.display()))
    }

    /// Top-level entries, in order.
    pub fn top_level(&self) -> impl Iterator<Item = &LockEntry> {
        self.entries.iter().filter(|e| e.is_top_level())
    }

    /// Checks this lockfile against the profile's current declarations.
    ///
    /// Returns the name of the first top-level dependency whose declaration
    /// drifted (descriptor changed, entry missing, or entry no longer
    /// declared), or `None` when the lockfile still matches. A stale lockfile
    /// is never silently trusted; only an explicit re-vendor replaces it.
    #[must_use]
    pub fn stale_entry(&self, metadata: &Metadata, profile_dir: &Path) -> Option<String> {
        let locked: Vec<&LockEntry> = self.top_level().collect();

        for (index, decl) in metadata.depends.iter().enumerate() {
            let Ok(declared) = SourceDescriptor::from_decl(decl, profile_dir) else {
                return Some(decl.name.clone());
            };
            match locked.get(index) {
                Some(entry) if entry.name == decl.name && entry.descriptor() == declared => {}
                _ => return Some(decl.name.clone()),
            }
        }

        if locked.len() > metadata.depends.len() {
            return Some(locked[metadata.depends.len()].name.clone());
        }

        None
    }
}
