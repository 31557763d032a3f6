//! Shared test utilities for the integration suite.
//!
//! [`TestProject`] owns an isolated temp directory holding profiles, fixture
//! sources (local directories, git repositories, tar/zip archives), and a
//! dedicated dependency cache, plus helpers to run the `provend` binary
//! against them.

use anyhow::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Captured result of one `provend` invocation.
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// An isolated project layout for one test.
pub struct TestProject {
    root: tempfile::TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        Ok(Self {
            root: tempfile::TempDir::new()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// The per-test dependency cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.path().join("test-cache")
    }

    /// Creates `<name>/profile.yml` with the given depends block and one
    /// controls file, returning the profile directory.
    pub fn write_profile(&self, name: &str, depends_yaml: &str) -> Result<PathBuf> {
        let dir = self.root.path().join(name);
        fs::create_dir_all(dir.join("controls"))?;
        fs::write(
            dir.join("profile.yml"),
            format!("name: {name}\nversion: 0.1.0\n{depends_yaml}"),
        )?;
        fs::write(
            dir.join("controls").join("example.rb"),
            format!("control '{name}-01'\n"),
        )?;
        Ok(dir)
    }

    /// Initializes a git repository containing a profile, returning its path.
    pub fn create_git_source(&self, name: &str) -> Result<GitSource> {
        let dir = self.write_profile(name, "")?;
        let source = GitSource { dir };
        source.git(&["init", "--quiet", "--initial-branch", "main"])?;
        source.git(&["config", "user.email", "test@example.com"])?;
        source.git(&["config", "user.name", "Test"])?;
        source.commit_all("initial")?;
        Ok(source)
    }

    /// Builds a `.tar.gz` fixture archive containing a profile.
    pub fn create_tar_source(&self, name: &str) -> Result<PathBuf> {
        let archive_path = self.root.path().join(format!("{name}-1.0.0.tar.gz"));
        let file = fs::File::create(&archive_path)?;
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);

        append_tar_entry(&mut builder, "profile.yml", &format!("name: {name}\n"))?;
        append_tar_entry(
            &mut builder,
            "controls/example.rb",
            &format!("control '{name}-01'\n"),
        )?;
        builder.into_inner()?.finish()?;
        Ok(archive_path)
    }

    /// Builds a `.zip` fixture archive containing a profile.
    pub fn create_zip_source(&self, name: &str) -> Result<PathBuf> {
        let archive_path = self.root.path().join(format!("{name}-1.0.0.zip"));
        let file = fs::File::create(&archive_path)?;
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();

        writer.start_file("profile.yml", options)?;
        writer.write_all(format!("name: {name}\n").as_bytes())?;
        writer.start_file("controls/example.rb", options)?;
        writer.write_all(format!("control '{name}-01'\n").as_bytes())?;
        writer.finish()?;
        Ok(archive_path)
    }

    /// Runs the `provend` binary with the given arguments, always pointing it
    /// at this project's cache directory.
    pub fn run_provend(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut command = Command::new(assert_cmd::cargo::cargo_bin("provend"));
        command
            .args(args)
            .args(["--vendor-cache", &self.cache_dir().to_string_lossy()])
            .current_dir(self.root.path());

        let output = command.output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Sorted names of the published entries in the test cache (locks and
    /// staging infrastructure excluded).
    pub fn cache_entries(&self) -> Vec<String> {
        sorted_visible_entries(&self.cache_dir())
    }

    /// Sorted entry names of a profile's vendor directory.
    pub fn vendor_entries(&self, profile_dir: &Path) -> Vec<String> {
        sorted_visible_entries(&profile_dir.join("vendor"))
    }
}

/// A local git repository fixture used as a dependency source.
pub struct GitSource {
    dir: PathBuf,
}

impl GitSource {
    /// The clone URL (a plain local path; the system git handles it).
    pub fn url(&self) -> String {
        self.dir.to_string_lossy().into_owned()
    }

    pub fn git(&self, args: &[&str]) -> Result<()> {
        let output = Command::new("git").args(args).current_dir(&self.dir).output()?;
        anyhow::ensure!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        Ok(())
    }

    pub fn commit_all(&self, message: &str) -> Result<()> {
        self.git(&["add", "."])?;
        self.git(&["commit", "--quiet", "-m", message])
    }

    pub fn tag(&self, name: &str) -> Result<()> {
        self.git(&["tag", name])
    }

    /// Adds a file and commits it, moving the branch head forward.
    pub fn push_new_commit(&self, file: &str, content: &str) -> Result<()> {
        fs::write(self.dir.join(file), content)?;
        self.commit_all("advance")
    }

    /// The current HEAD commit id.
    pub fn head_commit(&self) -> Result<String> {
        let output = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(&self.dir)
            .output()?;
        anyhow::ensure!(output.status.success(), "rev-parse failed");
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn append_tar_entry<W: Write>(
    builder: &mut tar::Builder<W>,
    path: &str,
    content: &str,
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, content.as_bytes())?;
    Ok(())
}

fn sorted_visible_entries(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    names
}
