//! Command line argument parsing and validation.
//!
//! One invocation runs the whole pipeline; there are no subcommands.

use crate::bundler::{RunOptions, current_os};
use clap::Parser;
use std::path::PathBuf;

/// Release packager for cg-file-backup
#[derive(Parser, Debug, Clone)]
#[command(
    name = "cg_dist",
    version,
    about = "Stage, package and archive a cg-file-backup release",
    long_about = "Assemble a versioned distribution directory from the build output,
build a Debian package on Linux, and optionally zip the result.

Usage:
  cg_dist                     # version read from wails.json
  cg_dist 1.2.3 --zip         # explicit version, produce cg-file-backup-1.2.3.zip
  cg_dist --zip --clean       # archive, then remove intermediate outputs"
)]
pub struct Args {
    /// Release version; read from the build descriptor when omitted
    #[arg(index = 1, id = "release_version", value_name = "VERSION")]
    pub version: Option<String>,

    /// Compress the staging directory into <dist>.zip
    #[arg(long)]
    pub zip: bool,

    /// Remove the staging directory and top-level package after archiving
    #[arg(long)]
    pub clean: bool,

    /// Project root all inputs and outputs are resolved against
    #[arg(long, value_name = "DIR", env = "CG_DIST_PROJECT_ROOT")]
    pub project_root: Option<PathBuf>,

    /// Packaging settings file (default: <project-root>/dist.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Operating system the platform rule is evaluated against
    #[arg(long, value_name = "OS")]
    pub target_os: Option<String>,

    /// Print per-file detail
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if let Some(version) = &self.version
            && version.trim().is_empty()
        {
            return Err("Version must not be empty".to_string());
        }
        if let Some(os) = &self.target_os
            && os.trim().is_empty()
        {
            return Err("--target-os must not be empty".to_string());
        }
        Ok(())
    }

    /// Pipeline switches derived from the flags.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            archive: self.zip,
            clean: self.clean,
            target_os: self
                .target_os
                .as_deref()
                .map(str::trim)
                .unwrap_or(current_os())
                .to_string(),
        }
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
}

impl RuntimeConfig {
    /// Create runtime configuration
    pub fn new(verbose: bool) -> Self {
        Self {
            output: super::OutputManager::new(verbose),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new(false)
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self::new(args.verbose)
    }
}

impl RuntimeConfig {
    /// Print message
    pub fn println(&self, message: &str) {
        let _ = self.output.println(message);
    }

    /// Print a stage header
    pub fn section(&self, title: &str) {
        let _ = self.output.section(title);
    }

    /// Print an informational line
    pub fn info_println(&self, message: &str) {
        let _ = self.output.info(message);
    }

    /// Print message only with `--verbose`
    pub fn verbose_println(&self, message: &str) {
        let _ = self.output.verbose(message);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print warning message
    pub fn warning_println(&self, message: &str) {
        let _ = self.output.warn(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        let _ = self.output.success(message);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        let _ = self.output.indent(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_positional_version_coexists_with_version_flag() {
        let args = Args::try_parse_from(["cg_dist", "1.0.0", "--project-root", "/tmp"]).unwrap();
        assert_eq!(args.version.as_deref(), Some("1.0.0"));

        let err = Args::try_parse_from(["cg_dist", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_flags_map_to_run_options() {
        let args = Args::parse_from(["cg_dist", "1.2.3", "--zip", "--target-os", "windows"]);
        assert_eq!(args.version.as_deref(), Some("1.2.3"));

        let options = args.run_options();
        assert!(options.archive);
        assert!(!options.clean);
        assert_eq!(options.target_os, "windows");
    }

    #[test]
    fn test_target_os_defaults_to_host() {
        let args = Args::parse_from(["cg_dist"]);
        assert_eq!(args.run_options().target_os, std::env::consts::OS);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_blank_version_rejected() {
        let args = Args::parse_from(["cg_dist", "  "]);
        assert!(args.validate().is_err());
    }
}
