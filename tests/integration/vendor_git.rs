//! Git-sourced dependencies: fetching, cached replay, and overwrite
//! re-resolution. All repositories are local fixtures; no network involved.

use anyhow::Result;
use std::fs;

use crate::common::TestProject;

#[test]
fn vendors_a_git_dependency_and_locks_the_commit() -> Result<()> {
    let project = TestProject::new()?;
    let source = project.create_git_source("git-dep")?;
    source.tag("v1.0.0")?;

    let profile = project.write_profile(
        "git-profile",
        &format!(
            "depends:\n  - name: git-dep\n    git: {}\n    tag: v1.0.0\n",
            source.url()
        ),
    )?;

    let output = project.run_provend(&["vendor", &profile.to_string_lossy(), "--overwrite"])?;
    assert!(output.success, "vendor failed: {}", output.stderr);
    assert!(output.stdout.contains("fetching"));

    let lock = fs::read_to_string(profile.join("provend.lock"))?;
    assert!(lock.contains("kind = \"git\""));
    assert!(lock.contains("ref = \"v1.0.0\""));
    assert!(lock.contains(&format!("resolved_ref = \"{}\"", source.head_commit()?)));
    assert!(profile.join("vendor").join("git-dep").join("profile.yml").is_file());
    // the working tree is vendored, not the repository
    assert!(!profile.join("vendor").join("git-dep").join(".git").exists());
    Ok(())
}

/// A profile vendored once and then re-resolved (vendor tree removed, cache
/// kept) replays from the cache: the cached-dependency message appears and no
/// fetch happens.
#[test]
fn second_resolution_replays_from_cache() -> Result<()> {
    let project = TestProject::new()?;
    let source = project.create_git_source("cached-dep")?;

    let profile = project.write_profile(
        "replay-profile",
        &format!("depends:\n  - name: cached-dep\n    git: {}\n", source.url()),
    )?;

    let first = project.run_provend(&["vendor", &profile.to_string_lossy(), "--overwrite"])?;
    assert!(first.success, "vendor failed: {}", first.stderr);
    assert!(first.stdout.contains(&format!("fetching {}", source.url())));

    // force re-resolution without --overwrite: lock intact, vendor tree gone
    fs::remove_dir_all(profile.join("vendor"))?;

    let second = project.run_provend(&["vendor", &profile.to_string_lossy()])?;
    assert!(second.success, "vendor failed: {}", second.stderr);
    assert!(
        second
            .stdout
            .contains(&format!("using cached dependency for {}", source.url())),
        "stdout: {}",
        second.stdout
    );
    assert!(!second.stdout.contains("fetching"), "stdout: {}", second.stdout);
    Ok(())
}

/// Re-running with --overwrite after the branch head moved forward locks the
/// new commit.
#[test]
fn overwrite_follows_a_moved_branch_head() -> Result<()> {
    let project = TestProject::new()?;
    let source = project.create_git_source("moving-dep")?;

    let profile = project.write_profile(
        "moving-profile",
        &format!(
            "depends:\n  - name: moving-dep\n    git: {}\n    branch: main\n",
            source.url()
        ),
    )?;

    let first = project.run_provend(&["vendor", &profile.to_string_lossy(), "--overwrite"])?;
    assert!(first.success, "vendor failed: {}", first.stderr);
    let first_commit = source.head_commit()?;

    source.push_new_commit("new-control.rb", "control 'new'\n")?;
    let second_commit = source.head_commit()?;
    assert_ne!(first_commit, second_commit);

    let second = project.run_provend(&["vendor", &profile.to_string_lossy(), "--overwrite"])?;
    assert!(second.success, "vendor failed: {}", second.stderr);

    let lock = fs::read_to_string(profile.join("provend.lock"))?;
    assert!(
        lock.contains(&format!("resolved_ref = \"{second_commit}\"")),
        "lock must record the advanced commit: {lock}"
    );
    assert!(!lock.contains(&first_commit));
    Ok(())
}

#[test]
fn unknown_git_ref_fails_resolution() -> Result<()> {
    let project = TestProject::new()?;
    let source = project.create_git_source("pinned-dep")?;

    let profile = project.write_profile(
        "bad-ref-profile",
        &format!(
            "depends:\n  - name: pinned-dep\n    git: {}\n    tag: v9.9.9\n",
            source.url()
        ),
    )?;

    let output = project.run_provend(&["vendor", &profile.to_string_lossy(), "--overwrite"])?;
    assert!(!output.success);
    assert!(output.stderr.contains("pinned-dep"), "stderr: {}", output.stderr);
    Ok(())
}
