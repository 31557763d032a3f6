//! Basic vendoring behavior with local dependencies.

use anyhow::Result;
use predicates::prelude::*;

use crate::common::TestProject;

#[test]
fn vendor_rejects_a_nonexistent_profile_path() {
    assert_cmd::Command::cargo_bin("provend")
        .unwrap()
        .args(["vendor", "/no/such/profile"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("profile directory does not exist"));
}

#[test]
fn vendor_writes_vendor_dir_lockfile_and_summary() -> Result<()> {
    let project = TestProject::new()?;
    project.write_profile("common", "")?;
    let profile = project.write_profile(
        "root-profile",
        "depends:\n  - name: common\n    path: ../common\n",
    )?;

    let output = project.run_provend(&["vendor", &profile.to_string_lossy(), "--overwrite"])?;

    assert!(output.success, "vendor failed: {}", output.stderr);
    assert!(output.stdout.contains(&format!(
        "Dependencies for profile {} successfully vendored to {}",
        profile.display(),
        profile.join("vendor").display()
    )));
    assert!(profile.join("vendor").is_dir());
    assert!(profile.join("provend.lock").is_file());
    assert!(profile.join("vendor").join("common").join("profile.yml").is_file());
    Ok(())
}

#[test]
fn vendor_accepts_relative_paths() -> Result<()> {
    let project = TestProject::new()?;
    project.write_profile("common", "")?;
    let profile = project.write_profile(
        "relative-profile",
        "depends:\n  - name: common\n    path: ../common\n",
    )?;

    // the command runs with the project root as cwd
    let relative = format!(
        "{}/../{}",
        profile.file_name().unwrap().to_string_lossy(),
        profile.file_name().unwrap().to_string_lossy()
    );
    let output = project.run_provend(&["vendor", &relative, "--overwrite"])?;

    assert!(output.success, "vendor failed: {}", output.stderr);
    assert!(profile.join("vendor").is_dir());
    assert!(profile.join("provend.lock").is_file());
    assert!(!project.vendor_entries(&profile).is_empty());
    Ok(())
}

#[test]
fn vendor_defaults_to_the_current_directory() -> Result<()> {
    let project = TestProject::new()?;
    project.write_profile("common", "")?;
    let profile = project.write_profile(
        "cwd-profile",
        "depends:\n  - name: common\n    path: ../common\n",
    )?;

    let output = {
        // run from inside the profile directory, no path argument
        let mut command =
            std::process::Command::new(assert_cmd::cargo::cargo_bin("provend"));
        command
            .args(["vendor", "--overwrite"])
            .args(["--vendor-cache", &project.cache_dir().to_string_lossy()])
            .current_dir(&profile);
        command.output()?
    };

    assert!(output.status.success());
    assert!(profile.join("vendor").is_dir());
    assert!(profile.join("provend.lock").is_file());
    Ok(())
}

#[test]
fn missing_local_dependency_fails_with_nonzero_exit() -> Result<()> {
    let project = TestProject::new()?;
    let profile = project.write_profile(
        "broken-profile",
        "depends:\n  - name: ghost\n    path: ../no-such-dir\n",
    )?;

    let output = project.run_provend(&["vendor", &profile.to_string_lossy(), "--overwrite"])?;

    assert!(!output.success);
    assert!(output.stderr.contains("ghost"), "stderr: {}", output.stderr);
    assert!(!profile.join("provend.lock").exists());
    Ok(())
}

#[test]
fn nested_local_profiles_are_resolved_and_namespaced() -> Result<()> {
    let project = TestProject::new()?;
    project.write_profile("leaf", "")?;
    project.write_profile("middle", "depends:\n  - name: leaf\n    path: ../leaf\n")?;
    let profile = project.write_profile(
        "nested-root",
        "depends:\n  - name: middle\n    path: ../middle\n",
    )?;

    let output = project.run_provend(&["vendor", &profile.to_string_lossy(), "--overwrite"])?;
    assert!(output.success, "vendor failed: {}", output.stderr);

    let lock = std::fs::read_to_string(profile.join("provend.lock"))?;
    assert!(lock.contains("name = \"middle\""));
    assert!(lock.contains("name = \"middle/leaf\""));
    // only top-level dependencies appear in the vendor tree
    assert_eq!(project.vendor_entries(&profile), vec!["middle"]);
    Ok(())
}
