//! Staging directory assembly.
//!
//! Builds `<project>-<version>` from scratch on every run:
//!
//! 1. Any existing directory of that name is removed
//! 2. Flat files from the first existing build output directory are copied
//! 3. Configured dependency directories are copied recursively
//! 4. The first matching license file and credits file are copied
//!
//! The returned [`StagedDistribution`] remembers which entries came from the
//! build step, which the Debian layout needs later.

use crate::bundler::{
    error::{ErrorExt, Result},
    settings::{DependencyMapping, DistSettings},
    utils::fs::{copy_dir, copy_file_preserving, create_dir_all},
};
use crate::version::{ReleaseVersion, ResolvedVersion};
use std::path::{Path, PathBuf};
use tokio::fs;

/// A dependency directory that was copied into the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedDependency {
    /// Source directory under the project root.
    pub source: PathBuf,
    /// Destination relative to the staging directory.
    pub destination: PathBuf,
}

/// Output of the staging stage; required by the packaging stage.
#[derive(Debug, Clone)]
pub struct StagedDistribution {
    pub(crate) version: ReleaseVersion,
    pub(crate) dist_name: String,
    pub(crate) staging_dir: PathBuf,
    pub(crate) build_dir: Option<PathBuf>,
    pub(crate) build_artifacts: Vec<String>,
    pub(crate) skipped_build_entries: Vec<String>,
    pub(crate) dependencies: Vec<StagedDependency>,
    pub(crate) missing_dependencies: Vec<PathBuf>,
    pub(crate) license: Option<PathBuf>,
    pub(crate) credits: Option<PathBuf>,
}

impl StagedDistribution {
    /// The version being staged.
    pub fn version(&self) -> &ReleaseVersion {
        &self.version
    }

    /// `<project>-<version>`, the base name of every output.
    pub fn dist_name(&self) -> &str {
        &self.dist_name
    }

    /// Absolute path of the staging directory.
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Build output directory that was used, if any existed.
    pub fn build_dir(&self) -> Option<&Path> {
        self.build_dir.as_deref()
    }

    /// File names copied from the build output, sorted.
    pub fn build_artifacts(&self) -> &[String] {
        &self.build_artifacts
    }

    /// Non-file build output entries that were left out.
    pub fn skipped_build_entries(&self) -> &[String] {
        &self.skipped_build_entries
    }

    /// Dependency directories that were copied.
    pub fn dependencies(&self) -> &[StagedDependency] {
        &self.dependencies
    }

    /// Configured dependency directories that were not present.
    pub fn missing_dependencies(&self) -> &[PathBuf] {
        &self.missing_dependencies
    }

    /// License file inside the staging directory, if one was found.
    pub fn license(&self) -> Option<&Path> {
        self.license.as_deref()
    }

    /// Credits file inside the staging directory, if one was found.
    pub fn credits(&self) -> Option<&Path> {
        self.credits.as_deref()
    }
}

/// Name shared by the staging directory, package and archive.
pub fn dist_name(project_name: &str, version: &ReleaseVersion) -> String {
    format!("{}-{}", project_name, version)
}

/// Recreates the staging directory and fills it from the configured sources.
pub async fn assemble(
    base: &Path,
    settings: &DistSettings,
    resolved: ResolvedVersion,
) -> Result<StagedDistribution> {
    let version = resolved.version().clone();
    let dist_name = dist_name(&settings.project_name, &version);
    let staging_dir = base.join(&dist_name);

    if staging_dir.exists() {
        log::info!("Removing previous staging directory {}", staging_dir.display());
    }
    create_dir_all(&staging_dir, true).await?;
    log::info!("Staging {} into {}", dist_name, staging_dir.display());

    let mut staged = StagedDistribution {
        version,
        dist_name,
        staging_dir,
        build_dir: None,
        build_artifacts: Vec::new(),
        skipped_build_entries: Vec::new(),
        dependencies: Vec::new(),
        missing_dependencies: Vec::new(),
        license: None,
        credits: None,
    };

    stage_build_artifacts(base, &settings.build_dirs, &mut staged).await?;
    stage_dependencies(base, &settings.dependencies, &mut staged).await?;
    staged.license = stage_first_match(base, &settings.license_candidates, &staged.staging_dir).await?;
    staged.credits = stage_first_match(base, &settings.credits_candidates, &staged.staging_dir).await?;

    if staged.license.is_none() {
        log::warn!("No license file found (tried {:?})", settings.license_candidates);
    }

    Ok(staged)
}

/// Picks the first candidate build directory that exists.
pub fn select_build_dir(base: &Path, candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|candidate| base.join(candidate))
        .find(|path| path.is_dir())
}

async fn stage_build_artifacts(
    base: &Path,
    candidates: &[PathBuf],
    staged: &mut StagedDistribution,
) -> Result<()> {
    let Some(build_dir) = select_build_dir(base, candidates) else {
        log::warn!("Build directory not found (tried {:?})", candidates);
        return Ok(());
    };
    log::debug!("Using build output {}", build_dir.display());

    let mut entries = Vec::new();
    let mut read_dir = fs::read_dir(&build_dir)
        .await
        .fs_context("reading build directory", &build_dir)?;
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .fs_context("reading build directory", &build_dir)?
    {
        entries.push(entry.path());
    }
    entries.sort();

    for path in entries {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };

        // Follows symlinks, so a link to a file counts as a file.
        let is_file = fs::metadata(&path)
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false);

        if !is_file {
            log::debug!("Skipping non-file build entry {}", name);
            staged.skipped_build_entries.push(name);
            continue;
        }

        copy_file_preserving(&path, &staged.staging_dir.join(&name)).await?;
        log::info!("Copied build artifact {}", name);
        staged.build_artifacts.push(name);
    }

    staged.build_dir = Some(build_dir);
    Ok(())
}

async fn stage_dependencies(
    base: &Path,
    mappings: &[DependencyMapping],
    staged: &mut StagedDistribution,
) -> Result<()> {
    for mapping in mappings {
        let source = base.join(&mapping.source);
        if !source.is_dir() {
            log::debug!("Dependency directory {} not present", source.display());
            staged.missing_dependencies.push(mapping.source.clone());
            continue;
        }

        let destination = mapping.destination().to_path_buf();
        copy_dir(&source, &staged.staging_dir.join(&destination)).await?;
        log::info!(
            "Copied dependency {} -> {}",
            mapping.source.display(),
            destination.display()
        );
        staged.dependencies.push(StagedDependency {
            source: mapping.source.clone(),
            destination,
        });
    }
    Ok(())
}

/// Copies the first existing candidate into `staging_dir`, keeping its name.
async fn stage_first_match(
    base: &Path,
    candidates: &[String],
    staging_dir: &Path,
) -> Result<Option<PathBuf>> {
    for candidate in candidates {
        let source = base.join(candidate);
        if !source.is_file() {
            continue;
        }
        let Some(name) = source.file_name() else {
            continue;
        };
        let dest = staging_dir.join(name);
        copy_file_preserving(&source, &dest).await?;
        log::info!("Copied {}", candidate);
        return Ok(Some(dest));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::resolve_version;

    fn resolved(base: &Path, version: &str) -> ResolvedVersion {
        resolve_version(base, &Default::default(), Some(version)).unwrap()
    }

    #[tokio::test]
    async fn test_build_bin_preferred_over_build() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("build/bin")).unwrap();
        std::fs::write(tmp.path().join("build/bin/app"), "bin").unwrap();
        std::fs::write(tmp.path().join("build/stray.txt"), "not copied").unwrap();

        let staged = assemble(tmp.path(), &DistSettings::default(), resolved(tmp.path(), "1.0.0"))
            .await
            .unwrap();

        assert_eq!(staged.build_artifacts(), ["app".to_string()]);
        assert!(!staged.staging_dir().join("stray.txt").exists());
    }

    #[tokio::test]
    async fn test_falls_back_to_build_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("build")).unwrap();
        std::fs::write(tmp.path().join("build/app.exe"), "bin").unwrap();

        let staged = assemble(tmp.path(), &DistSettings::default(), resolved(tmp.path(), "1.0.0"))
            .await
            .unwrap();

        assert_eq!(staged.build_dir(), Some(tmp.path().join("build").as_path()));
        assert!(staged.staging_dir().join("app.exe").is_file());
    }

    #[tokio::test]
    async fn test_missing_build_dir_is_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();

        let staged = assemble(tmp.path(), &DistSettings::default(), resolved(tmp.path(), "1.0.0"))
            .await
            .unwrap();

        assert!(staged.build_dir().is_none());
        assert!(staged.build_artifacts().is_empty());
        assert!(staged.staging_dir().is_dir());
    }

    #[tokio::test]
    async fn test_first_license_candidate_wins() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("LICENSE.txt"), "txt").unwrap();
        std::fs::write(tmp.path().join("LICENSE.md"), "md").unwrap();
        std::fs::write(tmp.path().join("CREDITS.md"), "thanks").unwrap();

        let staged = assemble(tmp.path(), &DistSettings::default(), resolved(tmp.path(), "1.0.0"))
            .await
            .unwrap();

        assert_eq!(staged.license(), Some(staged.staging_dir().join("LICENSE.txt").as_path()));
        assert!(!staged.staging_dir().join("LICENSE.md").exists());
        assert_eq!(staged.credits(), Some(staged.staging_dir().join("CREDITS.md").as_path()));
    }

    #[tokio::test]
    async fn test_dependency_destination_mapping() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("vendor/bzip2/bin")).unwrap();
        std::fs::write(tmp.path().join("vendor/bzip2/bin/bzip2"), "tool").unwrap();

        let settings = DistSettings {
            dependencies: vec![
                DependencyMapping {
                    source: PathBuf::from("vendor/bzip2"),
                    destination: Some(PathBuf::from("bzip2-bin")),
                },
                DependencyMapping::same_name("hdiff-bin"),
            ],
            ..Default::default()
        };

        let staged = assemble(tmp.path(), &settings, resolved(tmp.path(), "1.0.0"))
            .await
            .unwrap();

        assert!(staged.staging_dir().join("bzip2-bin/bin/bzip2").is_file());
        assert_eq!(staged.missing_dependencies(), [PathBuf::from("hdiff-bin")]);
    }

    #[tokio::test]
    async fn test_stale_staging_contents_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let stale = tmp.path().join("cg-file-backup-1.0.0/old.bin");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, "stale").unwrap();

        assemble(tmp.path(), &DistSettings::default(), resolved(tmp.path(), "1.0.0"))
            .await
            .unwrap();

        assert!(!stale.exists());
    }
}
