//! Platform-conditional native packaging.
//!
//! Only one native format exists today: a Debian package built on the
//! operating systems listed in `deb.targets`. On any other OS the stage is a
//! no-op reported as [`PackageOutcome::NotTargeted`].
//!
//! # Outcomes
//!
//! Packaging never aborts a run. Every failure is folded into a
//! [`SkipReason`] so callers can tell a missing tool from a tool that ran and
//! failed, or from a tool that exited cleanly but left a broken file behind.

pub mod linux;

use std::future::Future;
use std::path::{Path, PathBuf};

/// The operating system the binary was compiled for.
pub fn current_os() -> &'static str {
    std::env::consts::OS
}

/// Result of the packaging stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOutcome {
    /// The platform rule excluded this OS.
    NotTargeted {
        /// OS the rule was evaluated against
        os: String,
    },
    /// A package was built and copied into the staging directory.
    Built {
        /// Package file next to the staging directory
        package: PathBuf,
        /// Copy shipped inside the staging directory
        staged_copy: PathBuf,
        /// Files that went into `usr/bin` (relative to it)
        installed: Vec<PathBuf>,
        /// Foreign-platform files left out of the package
        excluded: Vec<PathBuf>,
    },
    /// The package was not produced.
    Skipped(SkipReason),
}

impl PackageOutcome {
    /// Top-level package file, when one was built.
    pub fn package_path(&self) -> Option<&Path> {
        match self {
            PackageOutcome::Built { package, .. } => Some(package),
            _ => None,
        }
    }

    /// Whether the stage ran and failed.
    pub fn is_degraded(&self) -> bool {
        matches!(self, PackageOutcome::Skipped(_))
    }
}

/// Why a package was not produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The package root could not be laid out.
    LayoutFailed(String),
    /// The package tool is not installed.
    ToolMissing {
        /// Program that was looked up
        tool: String,
    },
    /// The package tool could not be started or exited unsuccessfully.
    ToolFailed {
        /// Program that was run
        tool: String,
        /// Exit code, if the process exited normally
        status: Option<i32>,
        /// Captured standard error
        stderr: String,
    },
    /// The tool reported success but its output is unusable.
    CorruptArtifact {
        /// Expected package path
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },
    /// The package was built but could not be copied into the staging directory.
    DeliveryFailed {
        /// Package that was built
        package: PathBuf,
        /// Why the copy failed
        reason: String,
    },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::LayoutFailed(reason) => write!(f, "package layout failed: {}", reason),
            SkipReason::ToolMissing { tool } => write!(f, "{} not found in PATH", tool),
            SkipReason::ToolFailed {
                tool,
                status,
                stderr,
            } => {
                match status {
                    Some(code) => write!(f, "{} exited with code {}", tool, code)?,
                    None => write!(f, "{} did not complete", tool)?,
                }
                if !stderr.trim().is_empty() {
                    write!(f, ": {}", stderr.trim())?;
                }
                Ok(())
            }
            SkipReason::CorruptArtifact { path, reason } => {
                write!(f, "{} is unusable: {}", path.display(), reason)
            }
            SkipReason::DeliveryFailed { package, reason } => {
                write!(f, "could not ship {}: {}", package.display(), reason)
            }
        }
    }
}

/// Failure reported by a [`PackageTool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// The program is not available.
    Missing,
    /// The program could not be spawned or exited unsuccessfully.
    Failed {
        /// Exit code, if any
        status: Option<i32>,
        /// Captured standard error, or the spawn error
        stderr: String,
    },
}

/// External program that turns a package root into a package file.
pub trait PackageTool {
    /// Program name for diagnostics.
    fn name(&self) -> &str;

    /// Builds `output` from the tree at `root`.
    fn build(
        &self,
        root: &Path,
        output: &Path,
    ) -> impl Future<Output = std::result::Result<(), ToolError>> + Send;
}
