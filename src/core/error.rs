//! Error handling for provend.
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** ([`ProvendError`]) so callers can match on
//!    precise failure modes (cycle vs. fetch failure vs. corrupt lockfile).
//! 2. **User-friendly reporting** ([`ErrorContext`]) so the CLI can render a
//!    colored message with an actionable suggestion instead of a bare chain.
//!
//! Any error during resolution, fetching, or extraction aborts the entire
//! vendoring run; the error always names the dependency and source that
//! triggered it. Transient network errors are not retried here - retry is a
//! caller-level policy.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for provend operations.
///
/// Each variant represents one failure mode of the vendoring engine and
/// carries enough context (dependency name, source locator, underlying
/// reason) to be surfaced to the user without further lookup.
#[derive(Error, Debug)]
pub enum ProvendError {
    /// The dependency graph contains a cycle.
    ///
    /// `chain` spells out the offending path, e.g. `"a -> b -> a"`.
    #[error("Circular dependency detected: {chain}")]
    CyclicDependency {
        /// Human-readable cycle path through dependency names
        chain: String,
    },

    /// A declared source cannot be resolved: local path missing, git ref not
    /// found, or archive URL unreachable at the resolution level.
    #[error("Cannot resolve source for dependency '{name}': {reason}")]
    UnresolvableSource {
        /// Name of the dependency whose source failed to resolve
        name: String,
        /// The source locator as declared
        source_locator: String,
        /// Why resolution failed
        reason: String,
    },

    /// A network transfer (git clone/fetch or archive download) failed.
    #[error("Failed to fetch dependency '{name}' from {source_locator}: {reason}")]
    FetchFailed {
        /// Name of the dependency being fetched
        name: String,
        /// The source locator being fetched
        source_locator: String,
        /// Transport-level failure description
        reason: String,
    },

    /// A payload carries a compressed-archive suffix this tool cannot unpack.
    #[error("Unsupported archive format: {path}")]
    UnsupportedArchive {
        /// Path of the offending payload
        path: String,
    },

    /// An archive was corrupt or the destination could not be written.
    ///
    /// The partially extracted destination is removed before this error
    /// propagates.
    #[error("Failed to extract archive {path}: {reason}")]
    ExtractionFailed {
        /// Path of the archive being extracted
        path: String,
        /// Underlying extraction failure
        reason: String,
    },

    /// The lockfile exists but cannot be parsed.
    #[error("Lockfile is corrupt: {file}")]
    LockfileCorrupt {
        /// Path of the lockfile
        file: String,
        /// Parse failure detail
        reason: String,
    },

    /// The lockfile parses but no longer matches the profile's current
    /// dependency declarations. Only an explicit re-vendor overwrites it.
    #[error("Lockfile {file} is stale: dependency '{name}' no longer matches the profile metadata")]
    StaleLockfile {
        /// Path of the lockfile
        file: String,
        /// First dependency whose declaration drifted
        name: String,
    },

    /// The vendor destination is missing or not writable.
    #[error("Output directory is invalid: {path}")]
    OutputDirectoryInvalid {
        /// The destination path
        path: String,
        /// Why it cannot be used
        reason: String,
    },

    /// The profile metadata file is missing or malformed.
    #[error("Invalid profile metadata in {file}: {reason}")]
    MetadataInvalid {
        /// Path of the metadata file
        file: String,
        /// Validation failure detail
        reason: String,
    },

    /// Git executable not found in PATH.
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// A git command returned a non-zero exit code.
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git operation that failed (e.g. "clone", "checkout")
        operation: String,
        /// Error output from the git command
        stderr: String,
    },

    /// Standard I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing error from profile metadata.
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML deserialization error.
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),
}

/// Wrapper adding a user-facing suggestion and optional details to an error.
///
/// The CLI converts any failure into an `ErrorContext` via
/// [`user_friendly_error`] before display, so users see what went wrong and
/// what to do about it rather than a bare error chain.
pub struct ErrorContext {
    /// The underlying error
    pub error: anyhow::Error,
    /// Actionable suggestion shown after the error message
    pub suggestion: Option<String>,
    /// Additional free-form details
    pub details: Option<String>,
}

impl ErrorContext {
    /// Creates a context wrapper around an error.
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self {
            error: error.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Attaches an actionable suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attaches additional details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Prints the error to stderr with color when attached to a terminal.
    pub fn display(&self) {
        eprintln!("{} {}", "error:".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("\n{details}");
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("\n{} {}", "hint:".yellow().bold(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(details) = &self.details {
            write!(f, "\n{details}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nhint: {suggestion}")?;
        }
        Ok(())
    }
}

/// Converts any error into an [`ErrorContext`] with a contextual suggestion.
///
/// Recognizes [`ProvendError`] variants anywhere in the chain and attaches
/// the matching guidance; unknown errors pass through without a suggestion.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let suggestion = match error.downcast_ref::<ProvendError>() {
        Some(ProvendError::CyclicDependency { .. }) => Some(
            "Remove the circular reference from the profile metadata; a profile cannot depend on itself, directly or transitively".to_string(),
        ),
        Some(ProvendError::UnresolvableSource { source_locator, .. }) => Some(format!(
            "Check that '{source_locator}' exists and is spelled correctly in profile.yml"
        )),
        Some(ProvendError::FetchFailed { .. }) => Some(
            "Check your network connection and that the remote is reachable, then re-run the command".to_string(),
        ),
        Some(ProvendError::UnsupportedArchive { .. }) => Some(
            "Only .tar, .tar.gz, .tgz, and .zip archives are supported".to_string(),
        ),
        Some(ProvendError::LockfileCorrupt { file, .. }) => Some(format!(
            "Delete {file} and re-run 'provend vendor' to regenerate it"
        )),
        Some(ProvendError::StaleLockfile { .. }) => Some(
            "The profile's dependencies changed since the last vendoring run; re-run with --overwrite to re-resolve".to_string(),
        ),
        Some(ProvendError::GitNotFound) => Some(
            "Install git from https://git-scm.com/ and ensure it is in your PATH".to_string(),
        ),
        Some(ProvendError::MetadataInvalid { .. }) => Some(
            "Fix the profile.yml file; each dependency needs a name and exactly one of path, git, or url".to_string(),
        ),
        _ => None,
    };

    let mut ctx = ErrorContext::new(error);
    if let Some(s) = suggestion {
        ctx = ctx.with_suggestion(s);
    }
    ctx
}
