//! Configuration structures for the packaging pipeline.
//!
//! Every allow-list the pipeline consults (build output candidates, dependency
//! directories, license and credits names, the Debian platform rule) lives
//! here as data. The defaults reproduce the stock `cg-file-backup` layout;
//! a `dist.toml` at the project root overrides any of them:
//!
//! ```toml
//! project_name = "cg-file-backup"
//! build_dirs = ["build/bin", "build"]
//!
//! [[dependencies]]
//! source = "hdiff-bin"
//!
//! [[dependencies]]
//! source = "vendor/bzip2"
//! destination = "bzip2-bin"
//!
//! [deb]
//! targets = ["linux"]
//! depends = ["libgtk-3-0", "libwebkit2gtk-4.0-37"]
//! ```

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

/// File name looked up at the project root when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "dist.toml";

/// Top-level packaging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DistSettings {
    /// Project name; the staging directory is `<project_name>-<version>`.
    pub project_name: String,

    /// Build output candidates, first existing directory wins.
    ///
    /// Default: `["build/bin", "build"]`
    pub build_dirs: Vec<PathBuf>,

    /// External tool directories copied recursively when present.
    pub dependencies: Vec<DependencyMapping>,

    /// License file names, tried in order; only the first match is copied.
    pub license_candidates: Vec<String>,

    /// Credits file names, tried in order; only the first match is copied.
    pub credits_candidates: Vec<String>,

    /// Where the release version is read from when none is given explicitly.
    pub descriptor: DescriptorSettings,

    /// The localized config file that embeds the version in display text.
    pub localized_config: LocalizedConfigSettings,

    /// Debian package settings, including the platform rule.
    pub deb: DebianSettings,
}

impl Default for DistSettings {
    fn default() -> Self {
        Self {
            project_name: "cg-file-backup".to_string(),
            build_dirs: vec![PathBuf::from("build/bin"), PathBuf::from("build")],
            dependencies: vec![
                DependencyMapping::same_name("hdiff-bin"),
                DependencyMapping::same_name("bzip2-bin"),
            ],
            license_candidates: vec![
                "LICENSE".to_string(),
                "LICENSE.txt".to_string(),
                "LICENSE.md".to_string(),
            ],
            credits_candidates: vec![
                "CREDITS".to_string(),
                "CREDITS.txt".to_string(),
                "CREDITS.md".to_string(),
            ],
            descriptor: DescriptorSettings::default(),
            localized_config: LocalizedConfigSettings::default(),
            deb: DebianSettings::default(),
        }
    }
}

impl DistSettings {
    /// Loads settings for a project rooted at `base`.
    ///
    /// An explicit path must exist. Without one, `<base>/dist.toml` is used
    /// when present and the built-in defaults otherwise.
    pub fn load(base: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                let path = base.join(path);
                if !path.is_file() {
                    return Err(ConfigError::NotFound { path }.into());
                }
                path
            }
            None => {
                let path = base.join(DEFAULT_CONFIG_FILE);
                if !path.is_file() {
                    log::debug!("No {} at {}, using defaults", DEFAULT_CONFIG_FILE, base.display());
                    return Ok(Self::default());
                }
                path
            }
        };

        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::Unreadable {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let settings = Self::parse(&contents, &path)?;
        log::debug!("Loaded packaging settings from {}", path.display());
        Ok(settings)
    }

    /// Parses and validates settings from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Self::parse(contents, Path::new(DEFAULT_CONFIG_FILE))
    }

    fn parse(contents: &str, origin: &Path) -> Result<Self> {
        let settings: Self = toml::from_str(contents).map_err(|e| ConfigError::Invalid {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;
        settings.validate().map_err(|reason| ConfigError::Invalid {
            path: origin.to_path_buf(),
            reason,
        })?;
        Ok(settings)
    }

    /// Checks the invariants the stages rely on.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.project_name.trim().is_empty() {
            return Err("project_name must not be empty".to_string());
        }
        if self.project_name.contains(['/', '\\']) {
            return Err(format!(
                "project_name '{}' must not contain path separators",
                self.project_name
            ));
        }
        for mapping in &self.dependencies {
            if !is_contained_relative(mapping.destination()) {
                return Err(format!(
                    "dependency destination {} must be a relative path inside the staging directory",
                    mapping.destination().display()
                ));
            }
        }
        if self.deb.license_name.is_empty() || self.deb.license_name.contains(['/', '\\']) {
            return Err(format!(
                "deb.license_name '{}' must be a plain file name",
                self.deb.license_name
            ));
        }
        Ok(())
    }
}

/// Maps a root-level tool directory to its place in the staging directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencyMapping {
    /// Directory relative to the project root.
    pub source: PathBuf,

    /// Destination relative to the staging directory.
    ///
    /// Default: same as `source`
    #[serde(default)]
    pub destination: Option<PathBuf>,
}

impl DependencyMapping {
    /// A mapping that keeps the directory name unchanged.
    pub fn same_name(name: impl Into<PathBuf>) -> Self {
        Self {
            source: name.into(),
            destination: None,
        }
    }

    /// Destination relative to the staging directory.
    pub fn destination(&self) -> &Path {
        self.destination.as_deref().unwrap_or(&self.source)
    }
}

/// Location of the release version inside the build descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DescriptorSettings {
    /// Descriptor path relative to the project root.
    pub path: PathBuf,

    /// Dotted path of the version field, e.g. `info.productVersion`.
    pub field: String,
}

impl Default for DescriptorSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("wails.json"),
            field: "info.productVersion".to_string(),
        }
    }
}

/// Location of the per-language text that embeds the version.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalizedConfigSettings {
    /// Config path relative to the project root.
    pub path: PathBuf,

    /// Top-level key holding the `language -> fields` mapping.
    pub section: String,

    /// Field, within each language, whose text carries the version.
    pub field: String,
}

impl Default for LocalizedConfigSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("frontend/src/assets/AppConfig.json"),
            section: "i18n".to_string(),
            field: "title".to_string(),
        }
    }
}

/// Debian package configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DebianSettings {
    /// Operating systems (as named by `std::env::consts::OS`) that get a .deb.
    ///
    /// Default: `["linux"]`
    pub targets: Vec<String>,

    /// File name suffixes never shipped in the package (case-insensitive).
    ///
    /// Default: `[".exe", ".dll"]`
    pub excluded_suffixes: Vec<String>,

    /// Debian architecture string written to the control file.
    pub architecture: String,

    /// Maintainer field.
    pub maintainer: String,

    /// Package dependencies in Debian syntax.
    pub depends: Vec<String>,

    /// Archive section.
    pub section: String,

    /// Package priority.
    pub priority: String,

    /// Single-line package description.
    pub description: String,

    /// Name of the external package-build program.
    pub tool: String,

    /// File name of the license inside `usr/share/doc/<project>`.
    pub license_name: String,
}

impl Default for DebianSettings {
    fn default() -> Self {
        Self {
            targets: vec!["linux".to_string()],
            excluded_suffixes: vec![".exe".to_string(), ".dll".to_string()],
            architecture: "amd64".to_string(),
            maintainer: "cg-file-backup maintainers <maintainers@example.invalid>".to_string(),
            depends: vec!["libgtk-3-0".to_string(), "libwebkit2gtk-4.0-37".to_string()],
            section: "utils".to_string(),
            priority: "optional".to_string(),
            description: "Generation-based file backup tool".to_string(),
            tool: "dpkg-deb".to_string(),
            license_name: "copyright".to_string(),
        }
    }
}

impl DebianSettings {
    /// Whether a package should be built on `os`.
    pub fn applies_to(&self, os: &str) -> bool {
        self.targets.iter().any(|target| target.eq_ignore_ascii_case(os))
    }

    /// Whether a file with this name belongs to a foreign platform.
    pub fn is_excluded(&self, file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        self.excluded_suffixes
            .iter()
            .any(|suffix| lower.ends_with(&suffix.to_ascii_lowercase()))
    }
}

/// True for a non-empty relative path made only of normal components.
pub(crate) fn is_contained_relative(path: &Path) -> bool {
    path.components().next().is_some()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}
