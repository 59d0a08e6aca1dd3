//! The packaging run as an ordered chain of stages.
//!
//! Each stage consumes the token produced by the one before it, so the
//! order is fixed by the types:
//!
//! ```text
//! resolve ─▶ ResolvedVersion ─▶ stage ─▶ StagedDistribution ─▶ package
//!   ─▶ PackagedDistribution ─▶ archive ─▶ ArchivedDistribution ─▶ clean
//! ```
//!
//! Nothing is written before [`Pipeline::resolve`] succeeds, and cleanup can
//! only be handed an [`ArchivedDistribution`], which exists only once the
//! archive step has finished.

use crate::bundler::{
    archive::create_zip,
    cleanup::{CleanupReport, remove_intermediates},
    platform::{
        PackageOutcome, PackageTool, current_os,
        linux::debian::{DpkgDeb, bundle_project, package_file},
    },
    settings::DistSettings,
    staging::{StagedDistribution, assemble},
};
use crate::error::Result;
use crate::version::{
    LocalizedUpdate, ResolvedVersion, resolve_version, sync_localized_config,
};
use std::path::{Path, PathBuf};

/// Per-run switches.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Produce `<dist>.zip`.
    pub archive: bool,
    /// Remove intermediate outputs once archived.
    pub clean: bool,
    /// OS the platform rule is evaluated against.
    pub target_os: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            archive: false,
            clean: false,
            target_os: current_os().to_string(),
        }
    }
}

/// Output of the packaging stage; required by the archive stage.
#[derive(Debug, Clone)]
pub struct PackagedDistribution {
    staged: StagedDistribution,
    outcome: PackageOutcome,
}

impl PackagedDistribution {
    /// The staged distribution.
    pub fn staged(&self) -> &StagedDistribution {
        &self.staged
    }

    /// What the native packaging step produced.
    pub fn outcome(&self) -> &PackageOutcome {
        &self.outcome
    }
}

/// Output of the archive stage; the only input cleanup accepts.
#[derive(Debug, Clone)]
pub struct ArchivedDistribution {
    packaged: PackagedDistribution,
    archive: Option<PathBuf>,
}

impl ArchivedDistribution {
    /// The packaged distribution.
    pub fn packaged(&self) -> &PackagedDistribution {
        &self.packaged
    }

    /// The zip file, when archiving was requested.
    pub fn archive(&self) -> Option<&Path> {
        self.archive.as_deref()
    }
}

/// Result of the cleanup stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// `clean` was not set.
    NotRequested,
    /// `clean` was set without an archive; nothing was deleted.
    KeptWithoutArchive,
    /// Intermediate outputs were removed (or were already gone).
    Cleaned(CleanupReport),
}

impl CleanupOutcome {
    /// Whether cleanup ran and nothing is left at `path`.
    pub fn cleared(&self, path: &Path) -> bool {
        match self {
            CleanupOutcome::Cleaned(report) => report.cleared(path),
            CleanupOutcome::NotRequested | CleanupOutcome::KeptWithoutArchive => false,
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Resolved version and where it came from.
    pub version: ResolvedVersion,
    /// Result of writing the version into the localized config.
    pub localized: LocalizedUpdate,
    /// Final state of the distribution.
    pub archived: ArchivedDistribution,
    /// Result of the cleanup stage.
    pub cleanup: CleanupOutcome,
}

impl RunSummary {
    /// The staging directory, if it still exists after cleanup.
    pub fn staging_dir(&self) -> Option<&Path> {
        let staging_dir = self.archived.packaged.staged.staging_dir();
        (!self.cleanup.cleared(staging_dir)).then_some(staging_dir)
    }
}

/// Packaging pipeline bound to one project root.
#[derive(Debug)]
pub struct Pipeline<T: PackageTool = DpkgDeb> {
    base: PathBuf,
    settings: DistSettings,
    options: RunOptions,
    tool: T,
}

impl Pipeline<DpkgDeb> {
    /// Pipeline using the configured Debian tool.
    pub fn new(base: impl Into<PathBuf>, settings: DistSettings, options: RunOptions) -> Self {
        let tool = DpkgDeb::new(settings.deb.tool.clone());
        Self {
            base: base.into(),
            settings,
            options,
            tool,
        }
    }
}

impl<T: PackageTool> Pipeline<T> {
    /// Replaces the package tool.
    pub fn with_tool<U: PackageTool>(self, tool: U) -> Pipeline<U> {
        Pipeline {
            base: self.base,
            settings: self.settings,
            options: self.options,
            tool,
        }
    }

    /// Project root every path is resolved against.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Active settings.
    pub fn settings(&self) -> &DistSettings {
        &self.settings
    }

    /// Active run options.
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Settles the release version. Performs no writes.
    pub fn resolve(&self, explicit: Option<&str>) -> Result<ResolvedVersion> {
        resolve_version(&self.base, &self.settings.descriptor, explicit)
    }

    /// Writes the resolved version into the localized config.
    pub fn propagate(&self, resolved: &ResolvedVersion) -> Result<LocalizedUpdate> {
        sync_localized_config(
            &self.base,
            &self.settings.localized_config,
            resolved.version(),
        )
    }

    /// Rebuilds the staging directory.
    pub async fn stage(&self, resolved: ResolvedVersion) -> Result<StagedDistribution> {
        Ok(assemble(&self.base, &self.settings, resolved).await?)
    }

    /// Builds the native package when the platform rule matches.
    pub async fn package(&self, staged: StagedDistribution) -> PackagedDistribution {
        let outcome = if self.settings.deb.applies_to(&self.options.target_os) {
            bundle_project(
                &staged,
                &self.settings,
                &self.base,
                &self.tool,
                self.options.clean,
            )
            .await
        } else {
            log::info!(
                "Skipping Debian package on {} (targets: {:?})",
                self.options.target_os,
                self.settings.deb.targets
            );
            PackageOutcome::NotTargeted {
                os: self.options.target_os.clone(),
            }
        };

        PackagedDistribution { staged, outcome }
    }

    /// Zips the staging directory when archiving was requested.
    pub async fn archive(&self, packaged: PackagedDistribution) -> Result<ArchivedDistribution> {
        let archive = if self.options.archive {
            Some(create_zip(packaged.staged.staging_dir()).await?)
        } else {
            None
        };
        Ok(ArchivedDistribution { packaged, archive })
    }

    /// Removes the staging directory and top-level package.
    ///
    /// Refuses to delete anything unless an archive was produced.
    pub async fn clean(&self, archived: &ArchivedDistribution) -> CleanupOutcome {
        if !self.options.clean {
            return CleanupOutcome::NotRequested;
        }
        if archived.archive.is_none() {
            log::warn!("Clean requested without an archive; keeping the staging directory");
            return CleanupOutcome::KeptWithoutArchive;
        }

        let staged = &archived.packaged.staged;
        let mut paths = vec![staged.staging_dir().to_path_buf()];
        if !matches!(archived.packaged.outcome, PackageOutcome::NotTargeted { .. }) {
            paths.push(package_file(&self.base, staged.dist_name()));
        }

        CleanupOutcome::Cleaned(remove_intermediates(&paths).await)
    }

    /// Runs every stage in order.
    pub async fn run(&self, explicit: Option<&str>) -> Result<RunSummary> {
        let version = self.resolve(explicit)?;
        let localized = self.propagate(&version)?;
        let staged = self.stage(version.clone()).await?;
        let packaged = self.package(staged).await;
        let archived = self.archive(packaged).await?;
        let cleanup = self.clean(&archived).await;

        Ok(RunSummary {
            version,
            localized,
            archived,
            cleanup,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::platform::ToolError;

    struct WritesDeb;

    impl PackageTool for WritesDeb {
        fn name(&self) -> &str {
            "fake-dpkg-deb"
        }

        async fn build(&self, _root: &Path, output: &Path) -> std::result::Result<(), ToolError> {
            std::fs::write(output, b"!<arch>\ndebian-binary").map_err(|e| ToolError::Failed {
                status: None,
                stderr: e.to_string(),
            })
        }
    }

    fn project() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("build/bin")).unwrap();
        std::fs::write(tmp.path().join("build/bin/app.bin"), "binary").unwrap();
        tmp
    }

    fn pipeline(base: &Path, archive: bool, clean: bool, os: &str) -> Pipeline<WritesDeb> {
        Pipeline::new(
            base,
            DistSettings::default(),
            RunOptions {
                archive,
                clean,
                target_os: os.to_string(),
            },
        )
        .with_tool(WritesDeb)
    }

    #[tokio::test]
    async fn test_unresolved_version_writes_nothing() {
        let tmp = project();
        let result = pipeline(tmp.path(), true, true, "linux").run(None).await;

        assert!(result.is_err());
        let entries: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("build")]);
    }

    #[tokio::test]
    async fn test_clean_without_archive_keeps_staging() {
        let tmp = project();
        let summary = pipeline(tmp.path(), false, true, "linux")
            .run(Some("1.0.0"))
            .await
            .unwrap();

        assert_eq!(summary.cleanup, CleanupOutcome::KeptWithoutArchive);
        assert!(tmp.path().join("cg-file-backup-1.0.0").is_dir());
        assert!(tmp.path().join("cg-file-backup-1.0.0.deb").is_file());
        assert!(!tmp.path().join("cg-file-backup-1.0.0_deb").exists());
    }

    #[tokio::test]
    async fn test_archive_then_clean_leaves_only_zip() {
        let tmp = project();
        let summary = pipeline(tmp.path(), true, true, "linux")
            .run(Some("1.0.0"))
            .await
            .unwrap();

        let zip = summary.archived.archive().unwrap();
        assert!(std::fs::metadata(zip).unwrap().len() > 0);
        assert!(summary.staging_dir().is_none());
        assert!(!tmp.path().join("cg-file-backup-1.0.0").exists());
        assert!(!tmp.path().join("cg-file-backup-1.0.0.deb").exists());
    }

    #[test]
    fn test_cleared_only_after_cleanup_ran() {
        let staging = PathBuf::from("/work/cg-file-backup-1.0.0");
        let package = PathBuf::from("/work/cg-file-backup-1.0.0.deb");

        assert!(!CleanupOutcome::NotRequested.cleared(&staging));
        assert!(!CleanupOutcome::KeptWithoutArchive.cleared(&staging));

        let cleaned = CleanupOutcome::Cleaned(CleanupReport {
            removed: vec![package.clone()],
            absent: Vec::new(),
            failed: vec![(staging.clone(), "permission denied".to_string())],
        });
        assert!(cleaned.cleared(&package));
        assert!(!cleaned.cleared(&staging));
    }

    #[tokio::test]
    async fn test_other_os_is_not_targeted() {
        let tmp = project();
        let summary = pipeline(tmp.path(), false, false, "windows")
            .run(Some("1.0.0"))
            .await
            .unwrap();

        assert_eq!(
            summary.archived.packaged().outcome(),
            &PackageOutcome::NotTargeted {
                os: "windows".to_string()
            }
        );
        assert!(!tmp.path().join("cg-file-backup-1.0.0.deb").exists());
    }
}
