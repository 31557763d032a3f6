//! Platform-specific helpers.
//!
//! Encapsulates the differences provend has to care about: locating the `git`
//! executable across platforms and normalizing path separators in
//! user-supplied locators so that equivalence keys compare correctly.

use anyhow::Result;
use std::path::PathBuf;

use crate::core::ProvendError;

/// Checks if the current platform is Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(target_os = "windows")
}

/// Locates the `git` executable on the current platform.
///
/// Uses PATH lookup via the `which` crate, which handles `git.exe` / `git.cmd`
/// resolution on Windows. Returns [`ProvendError::GitNotFound`] if git is not
/// installed.
pub fn get_git_command() -> Result<PathBuf> {
    which::which("git").map_err(|_| ProvendError::GitNotFound.into())
}

/// Normalizes path separators in a user-supplied locator string.
///
/// Profile metadata may be authored on Windows with backslash separators and
/// consumed elsewhere. Separators are unified to forward slashes before any
/// path resolution so that `..\\shared` and `../shared` produce the same
/// descriptor.
#[must_use]
pub fn normalize_separators(locator: &str) -> String {
    locator.replace('\\', "/")
}
