//! Debian package (.deb) bundler.
//!
//! Lays out a package root next to the staging directory and hands it to
//! `dpkg-deb --build`:
//!
//! ```text
//! <dist>_deb/
//! ├── DEBIAN/
//! │   ├── control
//! │   └── md5sums
//! └── usr/
//!     ├── bin/                      build artifacts and dependency dirs
//!     └── share/doc/<project>/
//!         └── copyright             license, when one was staged
//! ```
//!
//! Files whose names carry a foreign-platform suffix (`.exe`, `.dll`) are
//! never placed in the root. The finished `<dist>.deb` is also copied into
//! the staging directory so it ships with the other artifacts.

use crate::bundler::{
    error::{Error, ErrorExt, Result},
    platform::{PackageOutcome, PackageTool, SkipReason, ToolError},
    settings::DistSettings,
    staging::StagedDistribution,
    utils::fs::{copy_file, create_dir_all, remove_path, set_executable},
};
use std::{
    fmt::Write as _,
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tokio::io::AsyncReadExt;
use walkdir::WalkDir;

/// First bytes of every ar archive, and so of every .deb.
const AR_MAGIC: &[u8] = b"!<arch>\n";

/// Runs `dpkg-deb --build --root-owner-group <root> <output>`.
#[derive(Debug, Clone)]
pub struct DpkgDeb {
    program: String,
}

impl DpkgDeb {
    /// Uses `program` (looked up in `PATH`) as the package builder.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for DpkgDeb {
    fn default() -> Self {
        Self::new("dpkg-deb")
    }
}

impl PackageTool for DpkgDeb {
    fn name(&self) -> &str {
        &self.program
    }

    async fn build(&self, root: &Path, output: &Path) -> std::result::Result<(), ToolError> {
        let program = match which::which(&self.program) {
            Ok(path) => path,
            Err(e) => {
                log::debug!("{} not found in PATH: {}", self.program, e);
                return Err(ToolError::Missing);
            }
        };
        log::debug!(
            "Running {} --build --root-owner-group {} {}",
            program.display(),
            root.display(),
            output.display()
        );

        let result = tokio::process::Command::new(&program)
            .arg("--build")
            .arg("--root-owner-group")
            .arg(root)
            .arg(output)
            .output()
            .await;

        match result {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => Err(ToolError::Failed {
                status: out.status.code(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            }),
            Err(e) => Err(ToolError::Failed {
                status: None,
                stderr: e.to_string(),
            }),
        }
    }
}

/// The populated package root.
#[derive(Debug, Clone)]
pub struct DebLayout {
    /// Package root directory.
    pub root: PathBuf,
    /// Files placed under `usr/bin`, relative to it.
    pub installed: Vec<PathBuf>,
    /// Files left out because of their suffix, relative to the staging directory.
    pub excluded: Vec<PathBuf>,
}

/// Path of the transient package root for a distribution.
pub fn package_root(base: &Path, dist_name: &str) -> PathBuf {
    base.join(format!("{}_deb", dist_name))
}

/// Path of the top-level package file for a distribution.
pub fn package_file(base: &Path, dist_name: &str) -> PathBuf {
    base.join(format!("{}.deb", dist_name))
}

/// Builds the package and ships it inside the staging directory.
///
/// With `remove_root`, the package root is deleted once the tool has run,
/// whatever its result.
pub async fn bundle_project<T: PackageTool>(
    staged: &StagedDistribution,
    settings: &DistSettings,
    base: &Path,
    tool: &T,
    remove_root: bool,
) -> PackageOutcome {
    let root = package_root(base, staged.dist_name());
    let output = package_file(base, staged.dist_name());

    log::info!("Bundling {} ({})", output.display(), root.display());

    let layout = match generate_layout(staged, settings, &root).await {
        Ok(layout) => layout,
        Err(e) => {
            log::warn!("Failed to lay out Debian package: {}", e);
            discard_root(&root, remove_root).await;
            return PackageOutcome::Skipped(SkipReason::LayoutFailed(e.to_string()));
        }
    };

    let outcome = build_and_deliver(staged, tool, layout, &output).await;
    discard_root(&root, remove_root).await;
    outcome
}

async fn build_and_deliver<T: PackageTool>(
    staged: &StagedDistribution,
    tool: &T,
    layout: DebLayout,
    output: &Path,
) -> PackageOutcome {
    if let Err(e) = remove_path(output).await {
        log::warn!("Could not remove previous package: {}", e);
    }

    if let Err(e) = tool.build(&layout.root, output).await {
        let reason = match e {
            ToolError::Missing => SkipReason::ToolMissing {
                tool: tool.name().to_string(),
            },
            ToolError::Failed { status, stderr } => SkipReason::ToolFailed {
                tool: tool.name().to_string(),
                status,
                stderr,
            },
        };
        log::warn!("Skipping Debian package: {}", reason);
        return PackageOutcome::Skipped(reason);
    }

    if let Err(reason) = verify_package(output).await {
        log::warn!("{} is unusable: {}", output.display(), reason);
        return PackageOutcome::Skipped(SkipReason::CorruptArtifact {
            path: output.to_path_buf(),
            reason,
        });
    }

    let Some(file_name) = output.file_name() else {
        return PackageOutcome::Skipped(SkipReason::DeliveryFailed {
            package: output.to_path_buf(),
            reason: "package path has no file name".to_string(),
        });
    };
    let staged_copy = staged.staging_dir().join(file_name);
    if let Err(e) = copy_file(output, &staged_copy).await {
        return PackageOutcome::Skipped(SkipReason::DeliveryFailed {
            package: output.to_path_buf(),
            reason: e.to_string(),
        });
    }

    log::info!("✓ Created Debian package: {}", output.display());
    PackageOutcome::Built {
        package: output.to_path_buf(),
        staged_copy,
        installed: layout.installed,
        excluded: layout.excluded,
    }
}

async fn discard_root(root: &Path, remove_root: bool) {
    if !remove_root {
        return;
    }
    match remove_path(root).await {
        Ok(_) => log::debug!("Removed package root {}", root.display()),
        Err(e) => log::warn!("Failed to remove package root: {}", e),
    }
}

/// Checks that the tool left a non-empty ar archive behind.
async fn verify_package(path: &Path) -> std::result::Result<(), String> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| format!("not readable: {}", e))?;
    let mut magic = Vec::with_capacity(AR_MAGIC.len());
    file.take(AR_MAGIC.len() as u64)
        .read_to_end(&mut magic)
        .await
        .map_err(|e| format!("not readable: {}", e))?;

    if magic.is_empty() {
        return Err("file is empty".to_string());
    }
    if magic != AR_MAGIC {
        return Err("not an ar archive".to_string());
    }
    Ok(())
}

/// Populates the package root from the staged distribution.
pub async fn generate_layout(
    staged: &StagedDistribution,
    settings: &DistSettings,
    root: &Path,
) -> Result<DebLayout> {
    create_dir_all(root, true).await?;

    let bin_dir = root.join("usr/bin");
    let doc_dir = root.join("usr/share/doc").join(&settings.project_name);
    let control_dir = root.join("DEBIAN");
    for dir in [&bin_dir, &doc_dir, &control_dir] {
        create_dir_all(dir, false).await?;
    }

    let mut layout = DebLayout {
        root: root.to_path_buf(),
        installed: Vec::new(),
        excluded: Vec::new(),
    };

    for name in staged.build_artifacts() {
        if settings.deb.is_excluded(name) {
            log::debug!("Excluding {} from Debian package", name);
            layout.excluded.push(PathBuf::from(name));
            continue;
        }
        let dest = bin_dir.join(name);
        copy_file(&staged.staging_dir().join(name), &dest).await?;
        set_executable(&dest).await?;
        layout.installed.push(PathBuf::from(name));
    }

    for dependency in staged.dependencies() {
        let src_dir = staged.staging_dir().join(&dependency.destination);
        // Links are installed as copies of their targets; a dangling link fails the layout.
        for entry in WalkDir::new(&src_dir).follow_links(true).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel_path = dependency
                .destination
                .join(entry.path().strip_prefix(&src_dir)?);
            if settings
                .deb
                .is_excluded(&entry.file_name().to_string_lossy())
            {
                layout.excluded.push(rel_path);
                continue;
            }
            let dest = bin_dir.join(&rel_path);
            copy_file(entry.path(), &dest).await?;
            set_executable(&dest).await?;
            layout.installed.push(rel_path);
        }
    }

    if let Some(license) = staged.license() {
        copy_file(license, &doc_dir.join(&settings.deb.license_name)).await?;
    }

    let installed_size_kb = calculate_payload_size(root).await?.div_ceil(1024);
    let control = control_file_contents(settings, staged.version().as_str(), installed_size_kb);
    let control_path = control_dir.join("control");
    tokio::fs::write(&control_path, control)
        .await
        .fs_context("creating control file", &control_path)?;

    generate_md5sums(root).await?;

    Ok(layout)
}

/// Renders the `DEBIAN/control` file.
pub fn control_file_contents(settings: &DistSettings, version: &str, installed_size_kb: u64) -> String {
    let deb = &settings.deb;
    let package = settings.project_name.to_lowercase().replace(' ', "-");

    let mut control = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(control, "Package: {}", package);
    let _ = writeln!(control, "Version: {}", version);
    let _ = writeln!(control, "Architecture: {}", deb.architecture);
    let _ = writeln!(control, "Maintainer: {}", deb.maintainer);
    let _ = writeln!(control, "Installed-Size: {}", installed_size_kb);
    if !deb.depends.is_empty() {
        let _ = writeln!(control, "Depends: {}", deb.depends.join(", "));
    }
    if !deb.section.is_empty() {
        let _ = writeln!(control, "Section: {}", deb.section);
    }
    let _ = writeln!(control, "Priority: {}", deb.priority);
    let _ = writeln!(control, "Description: {}", deb.description);
    control
}

/// Writes `DEBIAN/md5sums` for every payload file.
async fn generate_md5sums(root: &Path) -> Result<()> {
    let root = root.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let md5sums_path = root.join("DEBIAN/md5sums");
        let mut file =
            File::create(&md5sums_path).fs_context("creating md5sums file", &md5sums_path)?;

        for entry in payload_entries(&root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let mut src = File::open(entry.path()).fs_context("opening file for MD5", entry.path())?;
            let mut context = md5::Context::new();
            io::copy(&mut src, &mut context)?;
            let digest = context.finalize();

            for byte in digest.iter() {
                write!(file, "{:02x}", byte)?;
            }
            let rel_path = entry.path().strip_prefix(&root)?;
            writeln!(file, "  {}", rel_path.display())?;
        }

        file.flush()?;
        Ok(())
    })
    .await
    .map_err(|e| Error::GenericError(format!("MD5sums generation task failed: {}", e)))?
}

/// Total size in bytes of the files that will be installed.
async fn calculate_payload_size(root: &Path) -> Result<u64> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<u64> {
        let mut total = 0u64;
        for entry in payload_entries(&root) {
            let entry = entry?;
            if entry.file_type().is_file() {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    })
    .await
    .map_err(|e| Error::GenericError(format!("Join error: {}", e)))?
}

/// Walks the package root, skipping the `DEBIAN` control directory.
fn payload_entries(root: &Path) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == "DEBIAN"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_file_fields() {
        let settings = DistSettings::default();
        let control = control_file_contents(&settings, "1.2.3", 42);

        assert!(control.starts_with("Package: cg-file-backup\nVersion: 1.2.3\n"));
        assert!(control.contains("Architecture: amd64\n"));
        assert!(control.contains("Installed-Size: 42\n"));
        assert!(control.contains("Depends: libgtk-3-0, libwebkit2gtk-4.0-37\n"));
        assert!(control.ends_with("Description: Generation-based file backup tool\n"));
    }

    #[test]
    fn test_control_file_omits_empty_depends() {
        let mut settings = DistSettings::default();
        settings.deb.depends.clear();
        let control = control_file_contents(&settings, "1.0.0", 1);
        assert!(!control.contains("Depends:"));
    }

    #[test]
    fn test_output_names() {
        let base = Path::new("/work");
        assert_eq!(
            package_root(base, "cg-file-backup-1.2.3"),
            PathBuf::from("/work/cg-file-backup-1.2.3_deb")
        );
        assert_eq!(
            package_file(base, "cg-file-backup-1.2.3"),
            PathBuf::from("/work/cg-file-backup-1.2.3.deb")
        );
    }

    async fn staged_project(base: &Path) -> StagedDistribution {
        let resolved = crate::version::resolve_version(base, &Default::default(), Some("1.0.0")).unwrap();
        crate::bundler::staging::assemble(base, &DistSettings::default(), resolved)
            .await
            .unwrap()
    }

    fn write(base: &Path, rel: &str, contents: &str) {
        let path = base.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_layout_installs_license_as_copyright() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path();
        write(base, "build/bin/app", "binary");
        write(base, "LICENSE", "MIT License\n");

        let staged = staged_project(base).await;
        let root = base.join("root");
        generate_layout(&staged, &DistSettings::default(), &root).await.unwrap();

        let copyright = root.join("usr/share/doc/cg-file-backup/copyright");
        assert_eq!(std::fs::read_to_string(copyright).unwrap(), "MIT License\n");
        assert!(!root.join("usr/bin/LICENSE").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_layout_marks_installed_files_executable() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path();
        write(base, "build/bin/app", "binary");
        write(base, "hdiff-bin/tool", "tool");
        for rel in ["build/bin/app", "hdiff-bin/tool"] {
            std::fs::set_permissions(base.join(rel), std::fs::Permissions::from_mode(0o644)).unwrap();
        }

        let staged = staged_project(base).await;
        let root = base.join("root");
        generate_layout(&staged, &DistSettings::default(), &root).await.unwrap();

        for rel in ["usr/bin/app", "usr/bin/hdiff-bin/tool"] {
            let mode = std::fs::metadata(root.join(rel)).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755, "{rel}");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_layout_installs_symlinked_dependency_files() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path();
        write(base, "build/bin/app", "binary");
        write(base, "hdiff-bin/hdiffz.real", "hdiffz");
        std::os::unix::fs::symlink("hdiffz.real", base.join("hdiff-bin/hdiffz")).unwrap();
        std::os::unix::fs::symlink("hdiffz.real", base.join("hdiff-bin/helper.exe")).unwrap();

        let staged = staged_project(base).await;
        let root = base.join("root");
        let layout = generate_layout(&staged, &DistSettings::default(), &root).await.unwrap();

        assert!(layout.installed.contains(&PathBuf::from("hdiff-bin/hdiffz")));
        assert!(layout.installed.contains(&PathBuf::from("hdiff-bin/hdiffz.real")));
        assert_eq!(layout.excluded, [PathBuf::from("hdiff-bin/helper.exe")]);

        let installed = root.join("usr/bin/hdiff-bin/hdiffz");
        assert!(installed.symlink_metadata().unwrap().file_type().is_file());
        assert_eq!(std::fs::read_to_string(installed).unwrap(), "hdiffz");
        assert!(!root.join("usr/bin/hdiff-bin/helper.exe").exists());

        let md5sums = std::fs::read_to_string(root.join("DEBIAN/md5sums")).unwrap();
        assert!(md5sums.contains("  usr/bin/hdiff-bin/hdiffz\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_layout_fails_on_dangling_dependency_link() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path();
        write(base, "hdiff-bin/tool", "tool");
        std::os::unix::fs::symlink("gone", base.join("hdiff-bin/broken")).unwrap();

        let staged = staged_project(base).await;
        let result = generate_layout(&staged, &DistSettings::default(), &base.join("root")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_verify_package_rejects_empty_and_foreign_files() {
        let tmp = tempfile::tempdir().unwrap();
        let empty = tmp.path().join("empty.deb");
        std::fs::write(&empty, b"").unwrap();
        assert_eq!(verify_package(&empty).await.unwrap_err(), "file is empty");

        let text = tmp.path().join("text.deb");
        std::fs::write(&text, b"hello world").unwrap();
        assert_eq!(verify_package(&text).await.unwrap_err(), "not an ar archive");

        let good = tmp.path().join("good.deb");
        std::fs::write(&good, b"!<arch>\ndebian-binary").unwrap();
        assert!(verify_package(&good).await.is_ok());
    }
}
