//! Archive detection and extraction.
//!
//! Payloads arrive either as directories (git working trees, local paths) or
//! as archive files (`.tar`, `.tar.gz`/`.tgz`, `.zip`). [`extract`] normalizes
//! both into a plain directory: archives are unpacked, directories and
//! unrecognized files are copied verbatim. The destination is always a
//! directory named by the caller (the dependency name, archive suffix
//! stripped), so nothing under a vendor tree ever keeps an archive suffix.
//!
//! Archives are untrusted input: entries that would escape the destination
//! (absolute paths, `..` traversal) are rejected. On any failure the
//! partially extracted destination is removed before the error propagates -
//! no half-extracted directories are left behind.

use anyhow::Result;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use std::path::Path;

use crate::core::ProvendError;
use crate::utils::fs::{copy_dir, ensure_dir, remove_dir_all};

/// Archive formats this tool can unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    Tar,
    TarGz,
    Zip,
}

/// Compressed suffixes we recognize but do not support. These fail loudly
/// instead of being copied verbatim, which would plant an archive file in the
/// vendor tree.
const UNSUPPORTED_SUFFIXES: &[&str] =
    &[".tar.bz2", ".tar.xz", ".tar.zst", ".gz", ".bz2", ".xz", ".rar", ".7z"];

fn detect_format(path: &Path) -> Result<Option<ArchiveFormat>> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        return Ok(Some(ArchiveFormat::TarGz));
    }
    if name.ends_with(".tar") {
        return Ok(Some(ArchiveFormat::Tar));
    }
    if name.ends_with(".zip") {
        return Ok(Some(ArchiveFormat::Zip));
    }
    if UNSUPPORTED_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        return Err(ProvendError::UnsupportedArchive {
            path: path.display().to_string(),
        }
        .into());
    }
    Ok(None)
}

/// Materializes `src` into the directory `dest`.
///
/// - Supported archives are unpacked into `dest`.
/// - Directories are copied verbatim.
/// - Files without a recognized archive suffix are copied verbatim into
///   `dest`.
/// - Recognized-but-unsupported compressed suffixes fail with
///   [`ProvendError::UnsupportedArchive`].
///
/// On extraction failure `dest` is removed before the error is returned.
pub fn extract(src: &Path, dest: &Path) -> Result<()> {
    if let Some(format) = detect_format(src)? {
        ensure_dir(dest)?;
        let result = match format {
            ArchiveFormat::Tar | ArchiveFormat::TarGz => extract_tar(src, dest, format),
            ArchiveFormat::Zip => extract_zip(src, dest),
        };
        if let Err(reason) = result {
            remove_dir_all(dest)?;
            return Err(ProvendError::ExtractionFailed {
                path: src.display().to_string(),
                reason: reason.to_string(),
            }
            .into());
        }
        return Ok(());
    }

    if src.is_dir() {
        copy_dir(src, dest)
    } else {
        ensure_dir(dest)?;
        let file_name = src.file_name().ok_or_else(|| ProvendError::ExtractionFailed {
            path: src.display().to_string(),
            reason: "payload has no file name".to_string(),
        })?;
        fs::copy(src, dest.join(file_name)).map_err(|e| ProvendError::ExtractionFailed {
            path: src.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

fn extract_tar(src: &Path, dest: &Path, format: ArchiveFormat) -> anyhow::Result<()> {
    let file = File::open(src)?;

    // tar::Archive::unpack refuses entries that would escape the destination.
    match format {
        ArchiveFormat::TarGz => tar::Archive::new(GzDecoder::new(file)).unpack(dest)?,
        _ => tar::Archive::new(file).unpack(dest)?,
    }
    Ok(())
}

fn extract_zip(src: &Path, dest: &Path) -> anyhow::Result<()> {
    let file = File::open(src)?;
    let mut archive = zip::ZipArchive::new(file)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(relative) = entry.enclosed_name() else {
            anyhow::bail!("entry '{}' escapes the destination", entry.name());
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            ensure_dir(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}
