//! # cg-file-backup release packaging
//!
//! Turns the desktop application's build output into a distributable release.
//!
//! A run goes through four stages, each consuming the output of the one
//! before it:
//!
//! - **Version**: taken from the command line or the build descriptor, then
//!   written into the localized application config
//! - **Staging**: `<project>-<version>/` rebuilt from the build output,
//!   helper tool directories and license files
//! - **Packaging**: a Debian package on Linux, built with `dpkg-deb`
//! - **Archive and cleanup**: optional zip of the staging directory, after
//!   which intermediate outputs can be removed
//!
//! ## Usage
//!
//! ```bash
//! cg_dist                    # version read from wails.json
//! cg_dist 1.2.3 --zip        # explicit version, zip the result
//! cg_dist --zip --clean      # keep only the archive
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bundler;
pub mod cli;
pub mod error;
pub mod version;

pub use bundler::{DistSettings, PackageOutcome, Pipeline, RunOptions, RunSummary};
pub use cli::Args;
pub use error::{CliError, ConfigError, DistError, Result, VersionError};
pub use version::{ReleaseVersion, ResolvedVersion, VersionSource};
