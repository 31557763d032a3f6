//! The `vendor` subcommand.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::vendor::{VendorOptions, vendor_profile};

/// Resolve and vendor a profile's dependencies.
#[derive(Args, Debug)]
pub struct VendorCommand {
    /// Path to the profile to vendor (defaults to the current directory)
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    /// Re-resolve and replace an existing lockfile and vendor directory
    #[arg(long)]
    overwrite: bool,

    /// Use DIR as the dependency cache for this run
    #[arg(long = "vendor-cache", value_name = "DIR")]
    vendor_cache: Option<PathBuf>,
}

impl VendorCommand {
    /// Runs the vendoring pass and reports the outcome.
    pub async fn execute(self) -> Result<()> {
        let path = self.path.unwrap_or_else(|| PathBuf::from("."));
        let options = VendorOptions {
            overwrite: self.overwrite,
            cache_dir: self.vendor_cache,
        };

        let report = vendor_profile(&path, &options).await?;
        tracing::debug!(
            profile = %report.profile_root.display(),
            dependencies = report.dependencies,
            reused = report.reused,
            "vendoring complete"
        );
        Ok(())
    }
}
