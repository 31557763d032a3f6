//! Git operations via the system `git` command.
//!
//! Like Cargo, provend shells out to the installed `git` binary instead of
//! embedding a git library: it inherits the user's credential helpers, proxy
//! configuration, and platform quirks for free. All operations go through the
//! [`GitCommand`](command_builder::GitCommand) builder for uniform timeouts
//! and error context.
//!
//! Only the operations vendoring needs are exposed: clone, checkout, and
//! resolving the current commit. Clones are shallow-by-default-free (full
//! clones) because a dependency ref may be any commit, tag, or branch.

pub mod command_builder;

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::core::ProvendError;
use crate::git::command_builder::GitCommand;

/// A handle to a local git repository working tree.
#[derive(Debug)]
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    /// Creates a handle for an existing repository path. Does not validate.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Clones `url` into `target`, returning a handle to the fresh clone.
    ///
    /// Clone failures are classified: a missing repository surfaces as an
    /// unresolvable source, transport problems as a generic git error the
    /// fetcher maps to a fetch failure.
    pub async fn clone(url: &str, target: impl AsRef<Path>) -> Result<Self> {
        let target = target.as_ref();

        GitCommand::new()
            .args(["clone", url])
            .arg(target.to_string_lossy())
            .with_context(format!("cloning {url}"))
            .execute()
            .await?;

        Ok(Self::new(target))
    }

    /// Checks out a reference (branch, tag, or commit).
    pub async fn checkout(&self, ref_name: &str) -> Result<()> {
        GitCommand::new()
            .args(["checkout", "--quiet", ref_name])
            .current_dir(&self.path)
            .with_context(format!("checking out {ref_name}"))
            .execute()
            .await?;
        Ok(())
    }

    /// Resolves the commit id of the current `HEAD`.
    pub async fn current_commit(&self) -> Result<String> {
        let output = GitCommand::new()
            .args(["rev-parse", "HEAD"])
            .current_dir(&self.path)
            .execute()
            .await?;
        Ok(output.trimmed())
    }

    /// The working tree path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Classifies a git failure for a given remote into a vendoring error.
///
/// "Repository or ref does not exist" shapes become `UnresolvableSource`;
/// everything else (network, auth, timeout) becomes `FetchFailed`.
pub fn classify_git_error(err: anyhow::Error, name: &str, source: &str) -> anyhow::Error {
    let Some(ProvendError::GitCommandError { stderr, .. }) = err.downcast_ref::<ProvendError>()
    else {
        return err;
    };

    let lower = stderr.to_lowercase();
    let unresolvable = lower.contains("not found")
        || lower.contains("does not exist")
        || lower.contains("did not match any")
        || lower.contains("unknown revision")
        || lower.contains("pathspec");

    if unresolvable {
        ProvendError::UnresolvableSource {
            name: name.to_string(),
            source_locator: source.to_string(),
            reason: stderr.clone(),
        }
        .into()
    } else {
        ProvendError::FetchFailed {
            name: name.to_string(),
            source_locator: source.to_string(),
            reason: stderr.clone(),
        }
        .into()
    }
}
