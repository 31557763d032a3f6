//! Cycle detection across profile dependency graphs.

use anyhow::Result;

use crate::common::TestProject;

/// A → B → A fails resolution and performs no fetches.
#[test]
fn mutual_dependency_cycle_is_rejected() -> Result<()> {
    let project = TestProject::new()?;
    let profile_a = project.write_profile(
        "profile-a",
        "depends:\n  - name: profile-b\n    path: ../profile-b\n",
    )?;
    project.write_profile(
        "profile-b",
        "depends:\n  - name: profile-a\n    path: ../profile-a\n",
    )?;

    let output = project.run_provend(&["vendor", &profile_a.to_string_lossy(), "--overwrite"])?;

    assert!(!output.success);
    assert!(
        output.stderr.contains("Circular dependency"),
        "stderr: {}",
        output.stderr
    );
    assert!(!output.stdout.contains("fetching"));
    assert!(project.cache_entries().is_empty(), "no fetch may be cached");
    assert!(!profile_a.join("vendor").exists());
    assert!(!profile_a.join("provend.lock").exists());
    Ok(())
}

#[test]
fn longer_cycles_are_reported_with_their_chain() -> Result<()> {
    let project = TestProject::new()?;
    let profile_a = project.write_profile(
        "chain-a",
        "depends:\n  - name: chain-b\n    path: ../chain-b\n",
    )?;
    project.write_profile(
        "chain-b",
        "depends:\n  - name: chain-c\n    path: ../chain-c\n",
    )?;
    project.write_profile(
        "chain-c",
        "depends:\n  - name: chain-b\n    path: ../chain-b\n",
    )?;

    let output = project.run_provend(&["vendor", &profile_a.to_string_lossy(), "--overwrite"])?;

    assert!(!output.success);
    assert!(
        output.stderr.contains("chain-b -> chain-c -> chain-b"),
        "stderr: {}",
        output.stderr
    );
    Ok(())
}
