//! Archive handling: extraction into the vendor tree and the archive-free
//! invariant.

use anyhow::Result;
use std::fs;

use crate::common::TestProject;

/// A plain directory, a `.tar.gz`, and a `.zip` dependency side by side:
/// after vendoring, the vendor tree holds exactly three directories, each
/// non-empty.
#[test]
fn mixed_local_sources_are_all_materialized_as_directories() -> Result<()> {
    let project = TestProject::new()?;
    project.write_profile("plain-dir", "")?;
    let tar_path = project.create_tar_source("tar-profile")?;
    let zip_path = project.create_zip_source("zip-profile")?;

    let profile = project.write_profile(
        "local-depends",
        &format!(
            "depends:\n  - name: plain-dir\n    path: ../plain-dir\n  - name: tar-profile\n    path: ../{}\n  - name: zip-profile\n    path: ../{}\n",
            tar_path.file_name().unwrap().to_string_lossy(),
            zip_path.file_name().unwrap().to_string_lossy(),
        ),
    )?;

    let output = project.run_provend(&["vendor", &profile.to_string_lossy(), "--overwrite"])?;
    assert!(output.success, "vendor failed: {}", output.stderr);

    let entries = project.vendor_entries(&profile);
    assert_eq!(entries, vec!["plain-dir", "tar-profile", "zip-profile"]);

    for name in &entries {
        let entry = profile.join("vendor").join(name);
        assert!(entry.is_dir(), "{name} must be a directory");
        assert!(
            fs::read_dir(&entry)?.next().is_some(),
            "{name} must not be empty"
        );
    }
    Ok(())
}

/// Nothing under vendor/ may keep an archive suffix.
#[test]
fn vendor_tree_contains_no_archive_files() -> Result<()> {
    let project = TestProject::new()?;
    let tar_path = project.create_tar_source("archived")?;
    let profile = project.write_profile(
        "archive-depends",
        &format!(
            "depends:\n  - name: archived\n    path: ../{}\n",
            tar_path.file_name().unwrap().to_string_lossy()
        ),
    )?;

    let output = project.run_provend(&["vendor", &profile.to_string_lossy(), "--overwrite"])?;
    assert!(output.success, "vendor failed: {}", output.stderr);

    for entry in walkdir::WalkDir::new(profile.join("vendor")) {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy();
        assert!(
            !name.ends_with(".tar") && !name.ends_with(".tar.gz") && !name.ends_with(".zip"),
            "archive file left in vendor tree: {}",
            entry.path().display()
        );
    }
    assert!(profile.join("vendor").join("archived").join("profile.yml").is_file());
    Ok(())
}

#[test]
fn corrupt_archive_aborts_the_run_cleanly() -> Result<()> {
    let project = TestProject::new()?;
    let bad_archive = project.path().join("broken-1.0.0.tar.gz");
    fs::write(&bad_archive, b"not actually gzip")?;

    let profile = project.write_profile(
        "corrupt-depends",
        "depends:\n  - name: broken\n    path: ../broken-1.0.0.tar.gz\n",
    )?;

    let output = project.run_provend(&["vendor", &profile.to_string_lossy(), "--overwrite"])?;

    assert!(!output.success);
    assert!(!profile.join("vendor").exists());
    assert!(!profile.join("provend.lock").exists());
    Ok(())
}
