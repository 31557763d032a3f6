//! Type-safe git command builder for consistent command execution.
//!
//! Provides a small fluent API for building and executing git commands,
//! ensuring uniform timeout handling and error context across every git
//! operation in the crate.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::ProvendError;
use crate::utils::platform::get_git_command;

/// Default timeout for git network operations. On expiry the operation
/// surfaces as a fetch failure; there is no automatic retry.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Captured output of a completed git command.
#[derive(Debug)]
pub struct GitOutput {
    /// Standard output, UTF-8 lossy
    pub stdout: String,
    /// Standard error, UTF-8 lossy
    pub stderr: String,
}

impl GitOutput {
    /// Stdout with surrounding whitespace trimmed.
    #[must_use]
    pub fn trimmed(&self) -> String {
        self.stdout.trim().to_string()
    }
}

/// Builder for one git invocation.
///
/// Defaults: 5-minute timeout, output captured, current process working
/// directory, inherited environment.
pub struct GitCommand {
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    timeout_duration: Duration,
    context: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            timeout_duration: GIT_TIMEOUT,
            context: None,
        }
    }
}

impl GitCommand {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the working directory for the git invocation.
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Adds a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Overrides the default timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Attaches a context string used in error messages.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Runs the command, returning captured output on success.
    ///
    /// A non-zero exit becomes [`ProvendError::GitCommandError`] carrying the
    /// operation name and stderr; a timeout is reported the same way with a
    /// synthetic "timed out" stderr so callers can classify it uniformly.
    pub async fn execute(self) -> Result<GitOutput> {
        let git = get_git_command()?;
        let operation = self.args.first().cloned().unwrap_or_default();

        let mut command = Command::new(git);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Never fall back to interactive credential prompts
            .env("GIT_TERMINAL_PROMPT", "0");

        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let description = self
            .context
            .unwrap_or_else(|| format!("git {}", self.args.join(" ")));

        let output = timeout(self.timeout_duration, command.output())
            .await
            .map_err(|_| ProvendError::GitCommandError {
                operation: operation.clone(),
                stderr: format!(
                    "timed out after {} seconds",
                    self.timeout_duration.as_secs()
                ),
            })?
            .with_context(|| format!("Failed to run {description}"))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ProvendError::GitCommandError {
                operation,
                stderr: stderr.trim().to_string(),
            }
            .into());
        }

        Ok(GitOutput { stdout, stderr })
    }
}
