//! Zip archive of the staging directory.
//!
//! The archive is written next to the staging directory as `<dist>.zip` and
//! every entry is stored under a `<dist>/` prefix, so extracting it recreates
//! the directory. Entries are sorted and stamped with a fixed timestamp; two
//! archives of identical staging trees are byte-identical.

use crate::bundler::error::{Context, Error, ErrorExt, Result};
use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

/// Path of the archive for a staging directory.
pub fn archive_path(staging_dir: &Path) -> Option<PathBuf> {
    let name = staging_dir.file_name()?;
    let mut file_name = name.to_os_string();
    file_name.push(".zip");
    Some(staging_dir.with_file_name(file_name))
}

/// Compresses `staging_dir` into `<staging_dir>.zip`.
///
/// The archive is assembled under a temporary name and renamed into place,
/// so an interrupted run never leaves a truncated `<dist>.zip` behind.
pub async fn create_zip(staging_dir: &Path) -> Result<PathBuf> {
    let dest = archive_path(staging_dir).context("staging directory has no name")?;
    let prefix = staging_dir
        .file_name()
        .context("staging directory has no name")?
        .to_string_lossy()
        .into_owned();
    let partial = dest.with_extension("zip.partial");

    log::info!("Archiving {} to {}", staging_dir.display(), dest.display());

    let src_dir = staging_dir.to_path_buf();
    let partial_path = partial.clone();
    let written = tokio::task::spawn_blocking(move || write_zip(&src_dir, &prefix, &partial_path))
        .await
        .map_err(|e| Error::GenericError(format!("Archive task failed: {}", e)))?;

    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e);
    }

    tokio::fs::rename(&partial, &dest)
        .await
        .fs_context("moving archive into place", &dest)?;

    Ok(dest)
}

fn write_zip(src_dir: &Path, prefix: &str, dest: &Path) -> Result<()> {
    let file = File::create(dest).fs_context("creating archive", dest)?;
    let mut zip = ZipWriter::new(file);

    for entry in WalkDir::new(src_dir).sort_by_file_name() {
        let entry = entry?;
        let rel_path = entry.path().strip_prefix(src_dir)?;
        let name = entry_name(prefix, rel_path);
        let metadata = entry.path().symlink_metadata()?;
        let options = entry_options(&metadata);

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{}/", name), options)?;
        } else if entry.file_type().is_symlink() {
            let target = std::fs::read_link(entry.path())
                .fs_context("reading symlink", entry.path())?;
            zip.add_symlink(name, target.to_string_lossy().into_owned(), options)?;
        } else {
            zip.start_file(name, options)?;
            let mut src = File::open(entry.path()).fs_context("opening file for archive", entry.path())?;
            io::copy(&mut src, &mut zip)?;
        }
    }

    zip.finish()?.sync_all()?;
    Ok(())
}

/// Zip entry name: forward slashes under the distribution prefix.
fn entry_name(prefix: &str, rel_path: &Path) -> String {
    let mut name = prefix.to_string();
    for component in rel_path.components() {
        name.push('/');
        name.push_str(&component.as_os_str().to_string_lossy());
    }
    name
}

fn entry_options(metadata: &std::fs::Metadata) -> SimpleFileOptions {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        options.unix_permissions(metadata.permissions().mode() & 0o7777)
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_archive_path_sits_next_to_staging_dir() {
        assert_eq!(
            archive_path(Path::new("/work/cg-file-backup-1.2.3")),
            Some(PathBuf::from("/work/cg-file-backup-1.2.3.zip"))
        );
    }

    #[test]
    fn test_entry_name_uses_prefix_and_forward_slashes() {
        assert_eq!(
            entry_name("dist-1.0", Path::new("hdiff-bin").join("tool").as_path()),
            "dist-1.0/hdiff-bin/tool"
        );
    }

    #[tokio::test]
    async fn test_zip_contains_prefixed_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = tmp.path().join("cg-file-backup-1.2.3");
        std::fs::create_dir_all(staging.join("hdiff-bin")).unwrap();
        std::fs::write(staging.join("app.bin"), "payload").unwrap();
        std::fs::write(staging.join("hdiff-bin/tool"), "tool").unwrap();

        let zip_path = create_zip(&staging).await.unwrap();
        assert_eq!(zip_path, tmp.path().join("cg-file-backup-1.2.3.zip"));
        assert!(!tmp.path().join("cg-file-backup-1.2.3.zip.partial").exists());

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        let names: Vec<String> = archive.file_names().map(String::from).collect();
        assert!(names.contains(&"cg-file-backup-1.2.3/app.bin".to_string()));
        assert!(names.contains(&"cg-file-backup-1.2.3/hdiff-bin/tool".to_string()));

        let mut contents = String::new();
        archive
            .by_name("cg-file-backup-1.2.3/app.bin")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "payload");
    }

    #[tokio::test]
    async fn test_identical_trees_give_identical_archives() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = tmp.path().join("dist-1.0.0");
        std::fs::create_dir_all(staging.join("sub")).unwrap();
        std::fs::write(staging.join("a"), "a").unwrap();
        std::fs::write(staging.join("sub/b"), "b").unwrap();

        let first = std::fs::read(create_zip(&staging).await.unwrap()).unwrap();
        let second = std::fs::read(create_zip(&staging).await.unwrap()).unwrap();
        assert_eq!(first, second);
    }
}
