//! File system utilities used throughout provend.
//!
//! These helpers wrap [`std::fs`] with contextual error messages and the
//! atomicity guarantees the vendoring engine depends on: lockfiles and cache
//! entries are always published via write-to-temp followed by an atomic
//! rename, so readers never observe partially written state.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Creates a directory and all parent directories if they don't exist.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Writes content to a file atomically.
///
/// The content is written to a sibling temporary file, synced to disk, and
/// renamed into place. The target file is never observable in a partially
/// written state, even if the process is interrupted mid-write.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = path.with_extension("tmp");

    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;
        file.sync_all().context("Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

/// Recursively copies a directory and all its contents to a new location.
///
/// Creates the destination if needed, overwrites existing files, and skips
/// symlinks and special files.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;

    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            fs::copy(&src_path, &dst_path).with_context(|| {
                format!(
                    "Failed to copy file from {} to {}",
                    src_path.display(),
                    dst_path.display()
                )
            })?;
        }
        // Skip symlinks and other file types
    }

    Ok(())
}

/// Recursively removes a directory tree. Safe to call on a missing path.
pub fn remove_dir_all(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Lexically normalizes a path by folding `.` and `..` components.
///
/// Unlike [`fs::canonicalize`], this never touches the file system, so it
/// works on paths that don't exist yet and doesn't resolve symlinks (which
/// would make equivalence keys depend on e.g. `/var` vs `/private/var` on
/// macOS in an inconsistent way).
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !result.pop() {
                    result.push("..");
                }
            }
            Component::CurDir => {}
            other => result.push(other.as_os_str()),
        }
    }

    result
}

/// Calculates the SHA-256 checksum of a single file, returned as lowercase hex.
pub fn calculate_checksum(path: &Path) -> Result<String> {
    let content = fs::read(path)
        .with_context(|| format!("Failed to read file for checksum: {}", path.display()))?;

    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

/// Calculates a deterministic SHA-256 digest over a directory tree.
///
/// Files are visited in sorted order; each file contributes its
/// root-relative path (separator-normalized) and its byte content. Two trees
/// with identical layout and contents hash identically on every platform.
pub fn calculate_tree_checksum(root: &Path) -> Result<String> {
    let mut hasher = Sha256::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk: {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("Walked path escapes tree root: {}", entry.path().display()))?;
        hasher.update(crate::utils::platform::normalize_separators(&relative.to_string_lossy()));
        hasher.update([0u8]);

        let content = fs::read(entry.path())
            .with_context(|| format!("Failed to read file for checksum: {}", entry.path().display()))?;
        hasher.update(&content);
        hasher.update([0u8]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Makes a tree broadly readable so non-privileged consumers (e.g. packaging
/// plugins running as another user) can read published cache entries.
///
/// Directories become `0o755`, files `0o644`. No-op on non-Unix platforms.
pub fn make_world_readable(root: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        for entry in WalkDir::new(root) {
            let entry = entry.with_context(|| format!("Failed to walk: {}", root.display()))?;
            let mode = if entry.file_type().is_dir() { 0o755 } else { 0o644 };
            let perms = fs::Permissions::from_mode(mode);
            fs::set_permissions(entry.path(), perms).with_context(|| {
                format!("Failed to set permissions on: {}", entry.path().display())
            })?;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = root;
    }
    Ok(())
}
