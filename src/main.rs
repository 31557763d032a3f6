//! provend CLI entry point.
//!
//! Parses command-line arguments, executes the requested command, and renders
//! failures as user-friendly errors with actionable suggestions. Exit code is
//! 0 on success and 1 on any resolution, fetch, or extraction failure.

use anyhow::Result;
use clap::Parser;
use provend_cli::cli;
use provend_cli::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
