//! Removal of intermediate outputs after archiving.

use crate::bundler::utils::fs::remove_path;
use std::path::{Path, PathBuf};

/// What happened to each path handed to [`remove_intermediates`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Paths that existed and were deleted.
    pub removed: Vec<PathBuf>,
    /// Paths that were already gone.
    pub absent: Vec<PathBuf>,
    /// Paths that exist but could not be deleted, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl CleanupReport {
    /// Whether every path is now gone.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Whether `path` was handled and nothing is left at it.
    pub fn cleared(&self, path: &Path) -> bool {
        self.removed.iter().chain(&self.absent).any(|p| p == path)
    }
}

/// Deletes each path, continuing past failures.
///
/// A path that does not exist counts as cleaned.
pub async fn remove_intermediates(paths: &[PathBuf]) -> CleanupReport {
    let mut report = CleanupReport::default();

    for path in paths {
        match remove_path(path).await {
            Ok(true) => {
                log::info!("Removed {}", path.display());
                report.removed.push(path.clone());
            }
            Ok(false) => report.absent.push(path.clone()),
            Err(e) => {
                log::error!("Failed to remove {}: {}", path.display(), e);
                report.failed.push((path.clone(), e.to_string()));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_removes_existing_and_tolerates_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("dist-1.0.0");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("nested/file"), "x").unwrap();
        let missing = tmp.path().join("dist-1.0.0.deb");

        let report = remove_intermediates(&[dir.clone(), missing.clone()]).await;

        assert_eq!(report.removed, vec![dir.clone()]);
        assert_eq!(report.absent, vec![missing]);
        assert!(report.is_complete());
        assert!(report.cleared(&dir));
        assert!(!report.cleared(&tmp.path().join("other")));
        assert!(!dir.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_undeletable_path_is_reported_and_rest_continues() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("dist-1.0.0");
        let locked = dir.join("locked");
        std::fs::create_dir_all(&locked).unwrap();
        std::fs::write(locked.join("file"), "x").unwrap();
        let package = tmp.path().join("dist-1.0.0.deb");
        std::fs::write(&package, "deb").unwrap();

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();
        // Permission bits do not bind root.
        if std::fs::write(locked.join("write-check"), "x").is_ok() {
            std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let report = remove_intermediates(&[dir.clone(), package.clone()]).await;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, dir);
        assert!(!report.is_complete());
        assert!(!report.cleared(&dir));
        assert_eq!(report.removed, vec![package.clone()]);
        assert!(locked.join("file").exists());
        assert!(!package.exists());
    }
}
