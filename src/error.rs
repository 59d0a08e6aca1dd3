//! Error types for packaging runs.
//!
//! Only errors in this module end a run with a non-zero status. Degraded steps
//! (package tool missing, cleanup failures) are reported through their stage
//! outcomes instead.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for packaging operations
pub type Result<T> = std::result::Result<T, DistError>;

/// Main error type for packaging operations
#[derive(Error, Debug)]
pub enum DistError {
    /// Version resolution errors
    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    /// Packaging configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// Staging, archiving and other bundler errors
    #[error("Bundler error: {0}")]
    Bundler(#[from] crate::bundler::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Version resolution errors
#[derive(Error, Debug)]
pub enum VersionError {
    /// Neither an override nor a descriptor value was available
    #[error("No release version given and none could be read from {descriptor}: {reason}")]
    Unresolved {
        /// Descriptor that was consulted
        descriptor: PathBuf,
        /// Why the descriptor did not yield a version
        reason: String,
    },

    /// The resolved token cannot name a staging directory
    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion {
        /// Version string
        version: String,
        /// Reason for the error
        reason: String,
    },
}

/// Packaging configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Explicitly requested config file does not exist
    #[error("Config file not found: {path}")]
    NotFound {
        /// Path that was requested
        path: PathBuf,
    },

    /// Config file exists but could not be read
    #[error("Failed to read {path}: {reason}")]
    Unreadable {
        /// Config path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Config file is not valid
    #[error("Invalid config {path}: {reason}")]
    Invalid {
        /// Config path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Project root is missing or not a directory
    #[error("Project root {path} is not a directory")]
    ProjectRootMissing {
        /// Path given as project root
        path: PathBuf,
    },
}

impl DistError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            DistError::Version(VersionError::Unresolved { descriptor, .. }) => vec![
                "Pass the version explicitly: cg_dist 1.2.3".to_string(),
                format!("Or set the release version field in {}", descriptor.display()),
            ],
            DistError::Version(VersionError::InvalidVersion { .. }) => vec![
                "Use a plain version token such as 1.2.3 (no path separators)".to_string(),
            ],
            DistError::Config(ConfigError::NotFound { .. }) => vec![
                "Check the --config path, it is resolved against --project-root".to_string(),
            ],
            DistError::Config(ConfigError::Invalid { .. }) => vec![
                "Fix the reported key in the config file".to_string(),
                "Remove the file to fall back to the built-in defaults".to_string(),
            ],
            DistError::Cli(CliError::InvalidArguments { .. }) => vec![
                "Run cg_dist --help for usage".to_string(),
            ],
            DistError::Cli(CliError::ProjectRootMissing { .. }) => vec![
                "Run from the project directory or pass --project-root".to_string(),
            ],
            DistError::Bundler(_) | DistError::Io(_) => vec![
                "Check file permissions in the project root".to_string(),
                "Re-run the command; the staging directory is rebuilt from scratch".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_version_suggests_explicit_argument() {
        let err = DistError::from(VersionError::Unresolved {
            descriptor: PathBuf::from("wails.json"),
            reason: "file not found".to_string(),
        });
        let suggestions = err.recovery_suggestions();
        assert!(suggestions[0].contains("cg_dist 1.2.3"));
        assert!(err.to_string().contains("wails.json"));
    }

    #[test]
    fn test_invalid_arguments_points_to_help() {
        let err = DistError::from(CliError::InvalidArguments {
            reason: "Version must not be empty".to_string(),
        });
        assert!(err.to_string().contains("Invalid arguments"));
        assert_eq!(err.recovery_suggestions(), ["Run cg_dist --help for usage"]);
    }
}
