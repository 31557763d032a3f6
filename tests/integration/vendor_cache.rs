//! Cache behavior: idempotence, fetch deduplication, and cache mirroring.

use anyhow::Result;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use provend_cli::lockfile::LockFile;

use crate::common::TestProject;

/// Vendoring twice without --overwrite performs zero fetches on the second
/// run and leaves an identical vendor tree and lockfile.
#[test]
fn vendoring_twice_is_idempotent() -> Result<()> {
    let project = TestProject::new()?;
    let source = project.create_git_source("idem-dep")?;
    let profile = project.write_profile(
        "idem-profile",
        &format!("depends:\n  - name: idem-dep\n    git: {}\n", source.url()),
    )?;

    let first = project.run_provend(&["vendor", &profile.to_string_lossy()])?;
    assert!(first.success, "vendor failed: {}", first.stderr);
    let lock_after_first = fs::read_to_string(profile.join("provend.lock"))?;
    let vendor_after_first = project.vendor_entries(&profile);

    let second = project.run_provend(&["vendor", &profile.to_string_lossy()])?;
    assert!(second.success, "vendor failed: {}", second.stderr);

    assert!(!second.stdout.contains("fetching"), "stdout: {}", second.stdout);
    assert_eq!(
        fs::read_to_string(profile.join("provend.lock"))?,
        lock_after_first
    );
    assert_eq!(project.vendor_entries(&profile), vendor_after_first);
    Ok(())
}

/// Two differently-named dependencies with equivalent descriptors share one
/// fetch and one cache entry but stay distinct lock entries.
#[test]
fn equivalent_descriptors_are_fetched_once() -> Result<()> {
    let project = TestProject::new()?;
    let source = project.create_git_source("shared-dep")?;
    let profile = project.write_profile(
        "dedup-profile",
        &format!(
            "depends:\n  - name: first-name\n    git: {url}\n  - name: second-name\n    git: {url}\n",
            url = source.url()
        ),
    )?;

    let output = project.run_provend(&["vendor", &profile.to_string_lossy(), "--overwrite"])?;
    assert!(output.success, "vendor failed: {}", output.stderr);

    // exactly one fetch line despite two declarations
    assert_eq!(output.stdout.matches("fetching").count(), 1, "stdout: {}", output.stdout);
    assert_eq!(project.cache_entries().len(), 1);

    let lock = LockFile::load(&profile.join("provend.lock"))?;
    let names: Vec<&str> = lock.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["first-name", "second-name"]);
    assert_eq!(lock.entries[0].locator, lock.entries[1].locator);

    assert_eq!(
        project.vendor_entries(&profile),
        vec!["first-name", "second-name"]
    );
    Ok(())
}

/// The custom cache directory used during a run mirrors the vendor tree:
/// every lock entry's vendor content equals its cache entry's content, and
/// the cache holds exactly the run's keys.
#[test]
fn custom_cache_mirrors_the_vendor_tree() -> Result<()> {
    let project = TestProject::new()?;
    let source_a = project.create_git_source("mirror-a")?;
    let source_b = project.create_git_source("mirror-b")?;
    let profile = project.write_profile(
        "mirror-profile",
        &format!(
            "depends:\n  - name: mirror-a\n    git: {}\n  - name: mirror-b\n    git: {}\n",
            source_a.url(),
            source_b.url()
        ),
    )?;

    let output = project.run_provend(&["vendor", &profile.to_string_lossy(), "--overwrite"])?;
    assert!(output.success, "vendor failed: {}", output.stderr);

    let lock = LockFile::load(&profile.join("provend.lock"))?;
    let expected_keys: BTreeSet<String> = lock
        .entries
        .iter()
        .map(|entry| entry.descriptor().cache_key())
        .collect();
    let actual_keys: BTreeSet<String> = project.cache_entries().into_iter().collect();
    assert_eq!(actual_keys, expected_keys);

    for entry in lock.top_level() {
        let vendor_side = profile.join("vendor").join(&entry.name);
        let cache_side = project
            .cache_dir()
            .join(entry.descriptor().cache_key())
            .join("content");
        assert_eq!(
            file_listing(&vendor_side),
            file_listing(&cache_side),
            "vendor and cache content differ for '{}'",
            entry.name
        );
    }
    Ok(())
}

/// Relative file listing of a tree, for content comparison.
fn file_listing(root: &Path) -> BTreeSet<String> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .expect("walkdir yields paths under root")
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}
