//! Moving a finished working tree into the output directory.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{IoContext, Result};

/// Move `src` to `dst`, replacing `dst` if it is an empty directory.
///
/// A rename keeps the tree byte-identical. When the rename is not possible
/// (another device, or a `dst` that cannot be removed such as a mount point)
/// the tree is copied instead, preserving symlinks and file modes. An
/// existing `dst` directory is then filled in place.
pub fn publish_tree(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .io_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let existing = dst.is_dir();
    if existing && let Err(err) = fs::remove_dir(dst) {
        debug!(out_dir = %dst.display(), error = %err, "output directory stays, copying into it");
        return fill_existing_dir(src, dst);
    }

    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(err) => {
            if is_cross_device_os_error(&err) {
                debug!(out_dir = %dst.display(), "staging is on another device, copying");
            } else {
                debug!(out_dir = %dst.display(), error = %err, "rename failed, copying");
            }
            if existing {
                fs::create_dir(dst).io_context(|| {
                    format!("Failed to recreate output directory: {}", dst.display())
                })?;
                return fill_existing_dir(src, dst);
            }
            let result = copy_tree(src, dst);
            if result.is_err() {
                let _ = fs::remove_dir_all(dst);
            }
            result
        }
    }
}

/// Copy `src` into the directory `dst`, which stays in place; whatever was
/// copied is removed again on failure.
fn fill_existing_dir(src: &Path, dst: &Path) -> Result<()> {
    let result = copy_tree(src, dst);
    if result.is_err() {
        clear_dir(dst);
    }
    result
}

fn clear_dir(dir: &Path) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let removed = if entry.file_type().is_ok_and(|ty| ty.is_dir()) {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        if let Err(err) = removed {
            warn!(path = %path.display(), error = %err, "failed to remove partial output");
        }
    }
}

fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)
        .io_context(|| format!("Failed to create directory: {}", dst.display()))?;
    for entry in fs::read_dir(src).io_context(|| format!("Failed to read dir: {}", src.display()))?
    {
        let entry = entry.io_context(|| format!("Failed to read dir entry: {}", src.display()))?;
        let ty = entry
            .file_type()
            .io_context(|| format!("Failed to stat dir entry: {}", entry.path().display()))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());

        if ty.is_dir() {
            copy_tree(&from, &to)?;
        } else if ty.is_symlink() {
            copy_symlink(&from, &to)?;
        } else {
            fs::copy(&from, &to).io_context(|| {
                format!(
                    "Failed to copy file from {} to {}",
                    from.display(),
                    to.display()
                )
            })?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    let target =
        fs::read_link(from).io_context(|| format!("Failed to read link: {}", from.display()))?;
    std::os::unix::fs::symlink(&target, to)
        .io_context(|| format!("Failed to create symlink: {}", to.display()))
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)
        .map(|_| ())
        .io_context(|| format!("Failed to copy link target of {}", from.display()))
}

fn is_cross_device_os_error(err: &std::io::Error) -> bool {
    let Some(code) = err.raw_os_error() else {
        return false;
    };

    #[cfg(unix)]
    {
        const EXDEV: i32 = 18;
        code == EXDEV
    }

    #[cfg(windows)]
    {
        const ERROR_NOT_SAME_DEVICE: i32 = 17;
        code == ERROR_NOT_SAME_DEVICE
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = code;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn publishes_into_absent_destination() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("staging");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("sub").join("file.txt"), "content").unwrap();

        let dst = temp.path().join("nested").join("out");
        publish_tree(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(
            fs::read_to_string(dst.join("sub").join("file.txt")).unwrap(),
            "content"
        );
    }

    #[test]
    fn replaces_empty_destination() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("staging");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("README"), "hi").unwrap();
        let dst = temp.path().join("out");
        fs::create_dir_all(&dst).unwrap();

        publish_tree(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(dst.join("README")).unwrap(), "hi");
    }

    #[cfg(unix)]
    #[test]
    fn fills_existing_directory_in_place() {
        use std::os::unix::fs::MetadataExt;

        let temp = TempDir::new().unwrap();
        let src = temp.path().join("staging");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("sub").join("file.txt"), "content").unwrap();
        let dst = temp.path().join("out");
        fs::create_dir_all(&dst).unwrap();
        let inode = fs::metadata(&dst).unwrap().ino();

        fill_existing_dir(&src, &dst).unwrap();

        assert_eq!(fs::metadata(&dst).unwrap().ino(), inode);
        assert_eq!(
            fs::read_to_string(dst.join("sub").join("file.txt")).unwrap(),
            "content"
        );
    }

    #[test]
    fn failed_fill_leaves_directory_empty() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("staging");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("README"), "hi").unwrap();
        let dst = temp.path().join("out");
        fs::create_dir_all(&dst).unwrap();
        // a file where the tree needs a directory
        fs::write(dst.join("sub"), "blocker").unwrap();

        assert!(fill_existing_dir(&src, &dst).is_err());

        assert!(dst.is_dir());
        assert_eq!(fs::read_dir(&dst).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn publishes_into_existing_directory_of_read_only_parent() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let src = temp.path().join("staging");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("README"), "hi").unwrap();
        let parent = temp.path().join("srv");
        let dst = parent.join("out");
        fs::create_dir_all(&dst).unwrap();
        fs::set_permissions(&parent, fs::Permissions::from_mode(0o555)).unwrap();

        let result = publish_tree(&src, &dst);
        fs::set_permissions(&parent, fs::Permissions::from_mode(0o755)).unwrap();

        result.unwrap();
        assert_eq!(fs::read_to_string(dst.join("README")).unwrap(), "hi");
    }

    #[cfg(unix)]
    #[test]
    fn copy_tree_keeps_symlinks() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("target.txt"), "t").unwrap();
        std::os::unix::fs::symlink("target.txt", src.join("link")).unwrap();

        let dst = temp.path().join("dst");
        copy_tree(&src, &dst).unwrap();

        let link = fs::read_link(dst.join("link")).unwrap();
        assert_eq!(link, Path::new("target.txt"));
    }
}
