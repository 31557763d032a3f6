//! Profile metadata parsing and validation.
//!
//! A profile is a directory carrying a `profile.yml` metadata file that names
//! the profile and enumerates its direct dependencies. Each dependency
//! declares exactly one source: a local `path`, a `git` repository (with an
//! optional `ref`, `tag`, or `branch`), or a remote archive `url`.
//!
//! ```yaml
//! name: acme-baseline
//! version: 1.2.0
//! depends:
//!   - name: ssh-hardening
//!     git: https://example.com/ssh-baseline.git
//!     tag: v2.0.0
//!   - name: ssl-baseline
//!     url: https://example.com/ssl-baseline/archive/master.tar.gz
//!   - name: shared-controls
//!     path: ../shared-controls
//! ```
//!
//! Fetched payloads are themselves profile-like when their root (or, for
//! archives wrapping everything in a single top-level folder, that folder)
//! contains a `profile.yml`; only then does the resolver recurse into them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::ProvendError;

/// Fixed name of the profile metadata file.
pub const METADATA_FILE: &str = "profile.yml";

/// Parsed profile metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    /// Unique profile name
    pub name: String,
    /// Optional human-readable title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Optional profile version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Direct dependency declarations, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<DependencyDecl>,
}

/// One dependency declaration from `profile.yml`.
///
/// Exactly one of `path` / `git` / `url` must be set. `ref`, `tag`, and
/// `branch` are only meaningful for git sources; when several are given the
/// precedence is `ref` > `tag` > `branch`. Unrecognized string-valued keys
/// are preserved in `options`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyDecl {
    /// Dependency name, unique within one profile's direct dependency set
    pub name: String,
    /// Local path source (absolute, or relative to the declaring profile)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Git repository source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,
    /// Remote archive source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Git reference (takes precedence over `tag` and `branch`)
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Git tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Git branch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Any additional declaration keys, carried through to the descriptor
    #[serde(flatten)]
    pub options: BTreeMap<String, String>,
}

impl DependencyDecl {
    /// The effective git reference: `ref` wins over `tag` wins over `branch`.
    #[must_use]
    pub fn effective_ref(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .or(self.tag.as_deref())
            .or(self.branch.as_deref())
    }
}

impl Metadata {
    /// Loads and validates metadata from a `profile.yml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ProvendError::MetadataInvalid {
            file: path.display().to_string(),
            reason: format!("cannot read metadata file: {e}"),
        })?;

        let metadata: Self =
            serde_yaml::from_str(&content).map_err(|e| ProvendError::MetadataInvalid {
                file: path.display().to_string(),
                reason: e.to_string(),
            })?;

        metadata
            .validate()
            .map_err(|reason| ProvendError::MetadataInvalid {
                file: path.display().to_string(),
                reason,
            })?;

        Ok(metadata)
    }

    /// Loads metadata for a profile root directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let file = dir.join(METADATA_FILE);
        if !file.is_file() {
            return Err(ProvendError::MetadataInvalid {
                file: file.display().to_string(),
                reason: format!("no {METADATA_FILE} found in {}", dir.display()),
            }
            .into());
        }
        Self::load(&file).with_context(|| format!("Failed to load profile at {}", dir.display()))
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("profile name must not be empty".to_string());
        }

        let mut seen = HashSet::new();
        for dep in &self.depends {
            if dep.name.trim().is_empty() {
                return Err("dependency name must not be empty".to_string());
            }
            if dep.name.contains('/') {
                return Err(format!(
                    "dependency name '{}' must not contain '/'",
                    dep.name
                ));
            }
            if !seen.insert(dep.name.as_str()) {
                return Err(format!("duplicate dependency name '{}'", dep.name));
            }

            let sources =
                [dep.path.is_some(), dep.git.is_some(), dep.url.is_some()].iter().filter(|s| **s).count();
            if sources != 1 {
                return Err(format!(
                    "dependency '{}' must declare exactly one of path, git, or url",
                    dep.name
                ));
            }

            if dep.git.is_none() && dep.effective_ref().is_some() {
                return Err(format!(
                    "dependency '{}' declares a ref/tag/branch but is not a git source",
                    dep.name
                ));
            }
        }

        Ok(())
    }
}

/// Locates the profile root inside a fetched payload.
///
/// Returns the directory containing `profile.yml`: the payload root itself,
/// or - for archives that wrap their content in a single top-level folder -
/// that folder. `None` when the payload is not profile-like.
#[must_use]
pub fn find_profile_root(payload: &Path) -> Option<PathBuf> {
    if payload.join(METADATA_FILE).is_file() {
        return Some(payload.to_path_buf());
    }

    // GitHub-style archives wrap everything in `<repo>-<ref>/`
    let mut entries = fs::read_dir(payload).ok()?.flatten();
    let first = entries.next()?;
    if entries.next().is_some() || !first.path().is_dir() {
        return None;
    }
    let inner = first.path();
    if inner.join(METADATA_FILE).is_file() {
        Some(inner)
    } else {
        None
    }
}
