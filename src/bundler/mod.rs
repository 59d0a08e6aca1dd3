//! Release packaging for cg-file-backup.
//!
//! Turns the application build output into a versioned distribution:
//! a staging directory, a Debian package on Linux, and an optional zip.
//!
//! # Configuration
//!
//! Packaging is configured via `dist.toml` in the project root. Every key is
//! optional:
//!
//! ```toml
//! project_name = "cg-file-backup"
//! build_dirs = ["build/bin", "build"]
//!
//! [[dependencies]]
//! source = "hdiff-bin"
//!
//! [deb]
//! targets = ["linux"]
//! depends = ["libgtk-3-0", "libwebkit2gtk-4.0-37"]
//! ```
//!
//! # Outputs
//!
//! | Output | When |
//! |--------|------|
//! | `<project>-<version>/` | Always |
//! | `<project>-<version>.deb` | Target OS listed in `deb.targets` and `dpkg-deb` available |
//! | `<project>-<version>.zip` | `--zip` |
//!
//! # Usage
//!
//! ```no_run
//! use cg_file_backup_dist::bundler::{DistSettings, Pipeline, RunOptions};
//! use std::path::Path;
//!
//! # async fn example() -> cg_file_backup_dist::Result<()> {
//! let settings = DistSettings::load(Path::new("."), None)?;
//! let options = RunOptions { archive: true, ..RunOptions::default() };
//! let summary = Pipeline::new(".", settings, options).run(Some("1.2.3")).await?;
//! println!("{:?}", summary.archived.archive());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod archive;
mod cleanup;
mod error;
mod pipeline;
pub(crate) mod platform;
mod settings;
mod staging;
mod utils;

pub use archive::{archive_path, create_zip};
pub use cleanup::{CleanupReport, remove_intermediates};
pub use error::{Context, Error, ErrorExt, Result};
pub use pipeline::{
    ArchivedDistribution, CleanupOutcome, PackagedDistribution, Pipeline, RunOptions, RunSummary,
};
pub use platform::{
    PackageOutcome, PackageTool, SkipReason, ToolError, current_os,
    linux::debian::{DebLayout, DpkgDeb, package_file, package_root},
};
pub use settings::{
    DEFAULT_CONFIG_FILE, DebianSettings, DependencyMapping, DescriptorSettings, DistSettings,
    LocalizedConfigSettings,
};
pub use staging::{StagedDependency, StagedDistribution, dist_name};
