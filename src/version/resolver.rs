//! Version resolution from explicit input or the build descriptor.

use crate::bundler::DescriptorSettings;
use crate::error::{Result, VersionError};
use std::fmt;
use std::path::{Path, PathBuf};

/// A validated release version token.
///
/// Non-empty, trimmed, and usable as part of a directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseVersion(String);

impl ReleaseVersion {
    /// Validates a raw version token.
    pub fn parse(raw: &str) -> Result<Self> {
        let version = raw.trim();
        let invalid = |reason: &str| VersionError::InvalidVersion {
            version: raw.to_string(),
            reason: reason.to_string(),
        };

        if version.is_empty() {
            return Err(invalid("version must not be empty").into());
        }
        if version == "." || version == ".." {
            return Err(invalid("version cannot be a relative directory name").into());
        }
        if version.contains(['/', '\\']) {
            return Err(invalid("version must not contain path separators").into());
        }
        if version.chars().any(char::is_control) {
            return Err(invalid("version must not contain control characters").into());
        }

        Ok(Self(version.to_string()))
    }

    /// The version as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a resolved version came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSource {
    /// Given on the command line.
    Explicit,
    /// Read from the build descriptor at this path.
    Descriptor(PathBuf),
}

/// Output of the version stage; required to start staging.
#[derive(Debug, Clone)]
pub struct ResolvedVersion {
    version: ReleaseVersion,
    source: VersionSource,
}

impl ResolvedVersion {
    /// The resolved version.
    pub fn version(&self) -> &ReleaseVersion {
        &self.version
    }

    /// Where the version was taken from.
    pub fn source(&self) -> &VersionSource {
        &self.source
    }
}

/// Settles the release version.
///
/// An explicit value always wins. Otherwise the descriptor field is read.
/// Performs no writes.
pub fn resolve_version(
    base: &Path,
    descriptor: &DescriptorSettings,
    explicit: Option<&str>,
) -> Result<ResolvedVersion> {
    if let Some(raw) = explicit {
        let version = ReleaseVersion::parse(raw)?;
        log::debug!("Using explicit version {}", version);
        return Ok(ResolvedVersion {
            version,
            source: VersionSource::Explicit,
        });
    }

    let path = base.join(&descriptor.path);
    let raw = read_descriptor_version(&path, &descriptor.field).map_err(|reason| {
        VersionError::Unresolved {
            descriptor: path.clone(),
            reason,
        }
    })?;
    let version = ReleaseVersion::parse(&raw)?;
    log::debug!("Read version {} from {}", version, path.display());

    Ok(ResolvedVersion {
        version,
        source: VersionSource::Descriptor(path),
    })
}

/// Reads a string field, addressed by a dotted path, from a JSON descriptor.
///
/// The error is a human-readable reason suitable for [`VersionError::Unresolved`].
pub fn read_descriptor_version(path: &Path, field: &str) -> std::result::Result<String, String> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            "descriptor file not found".to_string()
        } else {
            format!("failed to read descriptor: {}", e)
        }
    })?;

    let document: serde_json::Value =
        serde_json::from_str(&contents).map_err(|e| format!("descriptor is not valid JSON: {}", e))?;

    let mut current = &document;
    for key in field.split('.') {
        current = current
            .get(key)
            .ok_or_else(|| format!("field '{}' not present", field))?;
    }

    match current.as_str().map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        Some(_) => Err(format!("field '{}' is empty", field)),
        None => Err(format!("field '{}' is not a string", field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DistError;

    fn write_descriptor(dir: &Path, body: &str) {
        std::fs::write(dir.join("wails.json"), body).unwrap();
    }

    #[test]
    fn test_descriptor_version_used_without_override() {
        let tmp = tempfile::tempdir().unwrap();
        write_descriptor(tmp.path(), r#"{"name":"cg","info":{"productVersion":"2.0.0"}}"#);

        let resolved = resolve_version(tmp.path(), &DescriptorSettings::default(), None).unwrap();

        assert_eq!(resolved.version().as_str(), "2.0.0");
        assert_eq!(
            resolved.source(),
            &VersionSource::Descriptor(tmp.path().join("wails.json"))
        );
    }

    #[test]
    fn test_override_wins_over_descriptor() {
        let tmp = tempfile::tempdir().unwrap();
        write_descriptor(tmp.path(), r#"{"info":{"productVersion":"2.0.0"}}"#);

        let resolved =
            resolve_version(tmp.path(), &DescriptorSettings::default(), Some("3.1.4")).unwrap();

        assert_eq!(resolved.version().as_str(), "3.1.4");
        assert_eq!(resolved.source(), &VersionSource::Explicit);
    }

    #[test]
    fn test_missing_descriptor_is_unresolved() {
        let tmp = tempfile::tempdir().unwrap();
        let err = resolve_version(tmp.path(), &DescriptorSettings::default(), None).unwrap_err();
        assert!(matches!(err, DistError::Version(VersionError::Unresolved { .. })));
    }

    #[test]
    fn test_missing_field_is_unresolved() {
        let tmp = tempfile::tempdir().unwrap();
        write_descriptor(tmp.path(), r#"{"info":{"companyName":"x"}}"#);
        let err = resolve_version(tmp.path(), &DescriptorSettings::default(), None).unwrap_err();
        assert!(err.to_string().contains("info.productVersion"));
    }

    #[test]
    fn test_blank_descriptor_value_is_unresolved() {
        let tmp = tempfile::tempdir().unwrap();
        write_descriptor(tmp.path(), r#"{"info":{"productVersion":"   "}}"#);
        assert!(resolve_version(tmp.path(), &DescriptorSettings::default(), None).is_err());
    }

    #[test]
    fn test_rejects_path_like_versions() {
        assert!(ReleaseVersion::parse("").is_err());
        assert!(ReleaseVersion::parse("..").is_err());
        assert!(ReleaseVersion::parse("1.0/../../etc").is_err());
        assert_eq!(ReleaseVersion::parse(" 0.0.1 ").unwrap().as_str(), "0.0.1");
    }
}
