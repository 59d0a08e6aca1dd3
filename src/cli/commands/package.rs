//! The packaging command: runs every stage and reports what it produced.

use crate::bundler::{
    CleanupOutcome, DistSettings, PackageOutcome, Pipeline, StagedDistribution,
};
use crate::cli::{Args, RuntimeConfig};
use crate::error::{CliError, Result};
use crate::version::{LocalizedUpdate, VersionSource};
use path_absolutize::Absolutize;
use std::path::PathBuf;

/// Run the pipeline for the project selected by `args`.
///
/// Returns exit code 0 once the archive stage has finished, even when the
/// Debian package was skipped or cleanup left something behind.
pub(super) async fn execute_package(args: &Args, config: &RuntimeConfig) -> Result<i32> {
    let base = project_root(args)?;
    let settings = DistSettings::load(&base, args.config.as_deref())?;
    let pipeline = Pipeline::new(base, settings, args.run_options());

    config.verbose_println(&format!("Project root: {}", pipeline.base().display()));

    config.section("Version");
    let resolved = pipeline.resolve(args.version.as_deref())?;
    match resolved.source() {
        VersionSource::Explicit => {
            config.success_println(&format!("Version {} (command line)", resolved.version()));
        }
        VersionSource::Descriptor(path) => {
            config.success_println(&format!(
                "Version {} (read from {})",
                resolved.version(),
                path.display()
            ));
        }
    }
    report_localized(config, &pipeline.propagate(&resolved)?);

    config.section("Staging");
    let staged = pipeline.stage(resolved).await?;
    report_staging(config, &staged);

    config.section("Debian package");
    let packaged = pipeline.package(staged).await;
    report_package(config, packaged.outcome());

    config.section("Archive");
    let archived = pipeline.archive(packaged).await?;
    match archived.archive() {
        Some(path) => config.success_println(&format!("Created {}", path.display())),
        None => config.info_println("Archive not requested (--zip)"),
    }

    config.section("Cleanup");
    let cleanup = pipeline.clean(&archived).await;
    match &cleanup {
        CleanupOutcome::NotRequested => config.info_println("Cleanup not requested (--clean)"),
        CleanupOutcome::KeptWithoutArchive => config.warning_println(
            "--clean needs an archive; keeping the staging directory (add --zip)",
        ),
        CleanupOutcome::Cleaned(report) => {
            for path in &report.removed {
                config.success_println(&format!("Removed {}", path.display()));
            }
            for path in &report.absent {
                config.verbose_println(&format!("Already gone: {}", path.display()));
            }
            for (path, reason) in &report.failed {
                config.error_println(&format!("Could not remove {}: {}", path.display(), reason));
            }
        }
    }

    config.section("Summary");
    let staged = archived.packaged().staged();
    if !cleanup.cleared(staged.staging_dir()) {
        config.indent(&format!("Staging:  {}", staged.staging_dir().display()));
    }
    if let Some(package) = archived.packaged().outcome().package_path()
        && !cleanup.cleared(package)
    {
        config.indent(&format!("Package:  {}", package.display()));
    }
    if let Some(archive) = archived.archive() {
        config.indent(&format!("Archive:  {}", archive.display()));
    }

    let mut degraded = Vec::new();
    if let PackageOutcome::Skipped(reason) = archived.packaged().outcome() {
        degraded.push(format!("Debian package skipped: {}", reason));
    }
    if let CleanupOutcome::Cleaned(report) = &cleanup
        && !report.is_complete()
    {
        degraded.push(format!("{} path(s) could not be removed", report.failed.len()));
    }

    if degraded.is_empty() {
        config.success_println(&format!("{} ready", staged.dist_name()));
    } else {
        for line in &degraded {
            config.warning_println(line);
        }
        config.success_println(&format!("{} ready with warnings", staged.dist_name()));
    }

    Ok(0)
}

fn project_root(args: &Args) -> Result<PathBuf> {
    let raw = match &args.project_root {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };
    let base = raw.absolutize()?.into_owned();

    if !base.is_dir() {
        return Err(CliError::ProjectRootMissing { path: base }.into());
    }
    Ok(base)
}

fn report_localized(config: &RuntimeConfig, update: &LocalizedUpdate) {
    match update {
        LocalizedUpdate::Missing { path } => {
            config.warning_println(&format!("{} not found, skipping version update", path.display()));
        }
        LocalizedUpdate::Malformed { path, reason } => {
            config.warning_println(&format!("{} left unchanged: {}", path.display(), reason));
        }
        LocalizedUpdate::Applied(report) => {
            if !report.updated.is_empty() {
                config.success_println(&format!(
                    "Updated {} ({})",
                    report.path.display(),
                    report.updated.join(", ")
                ));
            } else if !report.current.is_empty() {
                config.info_println(&format!("{} already up to date", report.path.display()));
            }
            if !report.unmatched.is_empty() {
                config.warning_println(&format!(
                    "No version text found for: {}",
                    report.unmatched.join(", ")
                ));
            }
        }
    }
}

fn report_staging(config: &RuntimeConfig, staged: &StagedDistribution) {
    config.info_println(&format!("Staging directory {}", staged.staging_dir().display()));

    match staged.build_dir() {
        Some(dir) => {
            config.success_println(&format!(
                "Copied {} file(s) from {}",
                staged.build_artifacts().len(),
                dir.display()
            ));
            for name in staged.build_artifacts() {
                config.verbose_println(name);
            }
            for name in staged.skipped_build_entries() {
                config.verbose_println(&format!("skipped directory {}", name));
            }
        }
        None => config.warning_println("No build output found; run the application build first"),
    }

    for dependency in staged.dependencies() {
        config.success_println(&format!(
            "Copied {} -> {}",
            dependency.source.display(),
            dependency.destination.display()
        ));
    }
    for missing in staged.missing_dependencies() {
        config.warning_println(&format!("Dependency {} not found", missing.display()));
    }

    match staged.license() {
        Some(path) => config.success_println(&format!("License {}", path.display())),
        None => config.warning_println("No license file found"),
    }
    match staged.credits() {
        Some(path) => config.success_println(&format!("Credits {}", path.display())),
        None => config.verbose_println("No credits file found"),
    }
}

fn report_package(config: &RuntimeConfig, outcome: &PackageOutcome) {
    match outcome {
        PackageOutcome::NotTargeted { os } => {
            config.info_println(&format!("Not built on {}", os));
        }
        PackageOutcome::Built {
            package,
            staged_copy,
            installed,
            excluded,
        } => {
            config.success_println(&format!("Created {}", package.display()));
            config.indent(&format!("copied to {}", staged_copy.display()));
            config.verbose_println(&format!("{} file(s) under usr/bin", installed.len()));
            for path in excluded {
                config.verbose_println(&format!("excluded {}", path.display()));
            }
        }
        PackageOutcome::Skipped(reason) => {
            config.error_println(&format!("Debian package skipped: {}", reason));
        }
    }
}
