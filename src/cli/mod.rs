//! Command-line interface for provend.
//!
//! Each subcommand lives in its own module with its own argument struct and
//! execution logic; this module defines the root [`Cli`] parser, the global
//! flags, and logging initialization.
//!
//! ```bash
//! # Vendor the profile in the current directory
//! provend vendor
//!
//! # Vendor a specific profile, re-resolving everything
//! provend vendor ./profiles/acme-baseline --overwrite
//!
//! # Use a custom dependency cache location
//! provend vendor ./profiles/acme-baseline --vendor-cache /srv/profile-cache
//! ```

mod vendor;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Root CLI parser for provend.
#[derive(Parser)]
#[command(
    name = "provend",
    about = "Vendor compliance profile dependencies into a lockfile-backed vendor tree",
    version,
    author
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (equivalent to RUST_LOG=debug)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Resolve and vendor a profile's dependencies.
    ///
    /// Computes the profile's full dependency closure, fetches each unique
    /// source at most once, extracts archives, writes the `vendor/`
    /// directory, and records the result in `provend.lock`.
    Vendor(vendor::VendorCommand),
}

impl Cli {
    /// Executes the parsed command.
    pub async fn execute(self) -> Result<()> {
        self.init_logging();

        match self.command {
            Commands::Vendor(cmd) => cmd.execute().await,
        }
    }

    fn init_logging(&self) {
        let default_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        };

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));

        // Logs go to stderr; stdout is reserved for the per-dependency
        // fetch/cache reports and the run summary.
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}
