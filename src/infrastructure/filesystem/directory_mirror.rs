use async_trait::async_trait;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::domain::value_objects::DirectorySelection;
use crate::infrastructure::stage_interface::{DirectoryMirror, DirectoryMirrorError, MirrorReport};

/// Filesystem-backed [`DirectoryMirror`]
///
/// Each selected top-level directory is removed from the data dir and copied
/// afresh from the repository. Other entries in the data dir are left alone.
#[derive(Debug, Clone, Default)]
pub struct FsDirectoryMirror;

impl FsDirectoryMirror {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DirectoryMirror for FsDirectoryMirror {
    async fn mirror(
        &self,
        repo_path: &Path,
        data_dir: &Path,
        selection: &DirectorySelection,
        owner_id: Option<u32>,
    ) -> Result<MirrorReport, DirectoryMirrorError> {
        if selection.is_empty() {
            return Err(DirectoryMirrorError::EmptySelection);
        }

        let repo_path = repo_path.to_path_buf();
        let data_dir = data_dir.to_path_buf();
        let selection = selection.clone();

        tokio::task::spawn_blocking(move || {
            mirror_blocking(&repo_path, &data_dir, &selection, owner_id)
        })
        .await
        .map_err(|e| DirectoryMirrorError::TaskFailed(e.to_string()))?
    }
}

fn mirror_blocking(
    repo_path: &Path,
    data_dir: &Path,
    selection: &DirectorySelection,
    owner_id: Option<u32>,
) -> Result<MirrorReport, DirectoryMirrorError> {
    let mut report = MirrorReport {
        owner_applied: owner_id,
        ..MirrorReport::default()
    };

    let mut present = Vec::with_capacity(selection.len());
    for name in selection.iter() {
        let source = repo_path.join(name);
        if source.is_dir() {
            present.push(name.to_string());
        } else {
            warn!(dir = %name, repo = %repo_path.display(), "configured directory not found in repo, skipping");
            report.missing.push(name.to_string());
        }
    }

    if present.is_empty() {
        return Err(DirectoryMirrorError::NothingToCopy {
            repo: repo_path.to_path_buf(),
        });
    }

    fs::create_dir_all(data_dir).map_err(|source| DirectoryMirrorError::DataDir {
        path: data_dir.to_path_buf(),
        source,
    })?;

    for name in present {
        let source = repo_path.join(&name);
        let destination = data_dir.join(&name);

        info!(dir = %name, to = %destination.display(), "mirroring directory");
        replace_tree(&source, &destination).map_err(|source| DirectoryMirrorError::Copy {
            name: name.clone(),
            source,
        })?;

        report.copied.push(name);
    }

    // Ownership is applied only once every directory has been copied
    if let Some(id) = owner_id {
        for name in &report.copied {
            chown_tree(&data_dir.join(name), id)?;
        }
    }

    Ok(report)
}

/// Remove `destination` and rebuild it as a copy of `source`
fn replace_tree(source: &Path, destination: &Path) -> io::Result<()> {
    remove_existing(destination)?;

    let mut directories: Vec<(PathBuf, fs::Permissions)> = Vec::new();

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(walk_error)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = destination.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
            directories.push((target, entry.metadata().map_err(walk_error)?.permissions()));
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    // Modes last, so read-only directories can still be populated
    for (dir, permissions) in directories.into_iter().rev() {
        fs::set_permissions(&dir, permissions)?;
    }

    debug!(from = %source.display(), to = %destination.display(), "tree copied");
    Ok(())
}

fn remove_existing(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let points_to = fs::read_link(link)?;
    std::os::unix::fs::symlink(points_to, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    // Fall back to copying whatever the link resolves to
    if link.is_dir() {
        fs::create_dir_all(target)
    } else {
        fs::copy(link, target).map(|_| ())
    }
}

fn walk_error(error: walkdir::Error) -> io::Error {
    match error.into_io_error() {
        Some(e) => e,
        None => io::Error::new(io::ErrorKind::Other, "filesystem loop detected"),
    }
}

/// Set user and group of every entry under `root` to `id`
#[cfg(unix)]
fn chown_tree(root: &Path, id: u32) -> Result<(), DirectoryMirrorError> {
    use std::os::unix::fs::{chown, lchown};

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| DirectoryMirrorError::Ownership {
            path: root.to_path_buf(),
            source: walk_error(e),
        })?;

        let result = if entry.path_is_symlink() {
            lchown(entry.path(), Some(id), Some(id))
        } else {
            chown(entry.path(), Some(id), Some(id))
        };
        result.map_err(|source| DirectoryMirrorError::Ownership {
            path: entry.path().to_path_buf(),
            source,
        })?;
    }

    Ok(())
}

#[cfg(not(unix))]
fn chown_tree(root: &Path, id: u32) -> Result<(), DirectoryMirrorError> {
    warn!(path = %root.display(), id, "ownership changes are not supported on this platform");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn selection(include: &str, exclude: &str) -> DirectorySelection {
        DirectorySelection::resolve(include, exclude)
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_empty_selection_fails_before_io() {
        let temp = TempDir::new().unwrap();
        let data_dir = temp.path().join("data");

        let result = FsDirectoryMirror::new()
            .mirror(temp.path(), &data_dir, &selection("plugins", "plugins"), None)
            .await;

        assert!(matches!(result, Err(DirectoryMirrorError::EmptySelection)));
        assert!(!data_dir.exists());
    }

    #[tokio::test]
    async fn test_nothing_to_copy() {
        let repo = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();

        let result = FsDirectoryMirror::new()
            .mirror(repo.path(), data.path(), &selection("plugins,world", ""), None)
            .await;

        assert!(matches!(result, Err(DirectoryMirrorError::NothingToCopy { .. })));
    }

    #[tokio::test]
    async fn test_replaces_selected_and_keeps_others() {
        let repo = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();

        write(&repo.path().join("world/level.dat"), "new-level");
        write(&repo.path().join("world/region/r.0.0.mca"), "region");
        write(&data.path().join("world/stale.dat"), "stale");
        write(&data.path().join("logs/latest.log"), "keep me");

        let report = FsDirectoryMirror::new()
            .mirror(repo.path(), data.path(), &selection("plugins,world", ""), None)
            .await
            .unwrap();

        assert_eq!(report.copied, vec!["world".to_string()]);
        assert_eq!(report.missing, vec!["plugins".to_string()]);
        assert_eq!(
            fs::read_to_string(data.path().join("world/level.dat")).unwrap(),
            "new-level"
        );
        assert!(data.path().join("world/region/r.0.0.mca").exists());
        assert!(!data.path().join("world/stale.dat").exists());
        assert_eq!(
            fs::read_to_string(data.path().join("logs/latest.log")).unwrap(),
            "keep me"
        );
    }

    #[tokio::test]
    async fn test_creates_missing_data_dir() {
        let repo = TempDir::new().unwrap();
        let temp = TempDir::new().unwrap();
        let data_dir = temp.path().join("nested").join("data");
        write(&repo.path().join("plugins/a.jar"), "jar");

        FsDirectoryMirror::new()
            .mirror(repo.path(), &data_dir, &selection("plugins", ""), None)
            .await
            .unwrap();

        assert!(data_dir.join("plugins/a.jar").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_are_recreated() {
        let repo = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        write(&repo.path().join("plugins/real.yml"), "x");
        std::os::unix::fs::symlink("real.yml", repo.path().join("plugins/link.yml")).unwrap();

        FsDirectoryMirror::new()
            .mirror(repo.path(), data.path(), &selection("plugins", ""), None)
            .await
            .unwrap();

        let link = data.path().join("plugins/link.yml");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("real.yml"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_destination_file_is_replaced_by_directory() {
        let repo = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        write(&repo.path().join("plugins/a.jar"), "jar");
        write(&data.path().join("plugins"), "i am a file");

        FsDirectoryMirror::new()
            .mirror(repo.path(), data.path(), &selection("plugins", ""), None)
            .await
            .unwrap();

        assert!(data.path().join("plugins").is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_chown_to_current_owner() {
        use std::os::unix::fs::MetadataExt;

        let repo = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        write(&repo.path().join("plugins/a.jar"), "jar");

        let metadata = fs::metadata(repo.path()).unwrap();
        // Ownership is applied as uid == gid; only meaningful when they match
        if metadata.uid() != metadata.gid() {
            return;
        }
        let id = metadata.uid();

        let report = FsDirectoryMirror::new()
            .mirror(repo.path(), data.path(), &selection("plugins", ""), Some(id))
            .await
            .unwrap();

        assert_eq!(report.owner_applied, Some(id));
        let copied = fs::metadata(data.path().join("plugins/a.jar")).unwrap();
        assert_eq!(copied.uid(), id);
        assert_eq!(copied.gid(), id);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ownership_failure_after_all_directories_copied() {
        use std::os::unix::fs::MetadataExt;

        let repo = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        write(&repo.path().join("world/level.dat"), "level");
        write(&repo.path().join("plugins/a.jar"), "jar");

        // root may chown to anyone, so the failure cannot be provoked
        if fs::metadata(repo.path()).unwrap().uid() == 0 {
            return;
        }

        let result = FsDirectoryMirror::new()
            .mirror(repo.path(), data.path(), &selection("world,plugins", ""), Some(0))
            .await;

        assert!(matches!(result, Err(DirectoryMirrorError::Ownership { .. })));
        assert!(data.path().join("world/level.dat").is_file());
        assert!(data.path().join("plugins/a.jar").is_file());
    }
}
