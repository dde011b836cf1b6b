//! Detection of unmaterialized git-lfs pointer files.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::command::GitRunner;
use crate::error::{IoContext, Result};

/// First line of every git-lfs pointer file.
pub const POINTER_PREFIX: &[u8] = b"version https://git-lfs.github.com/spec/";

/// Pointer files are tiny; anything larger is real content.
const MAX_POINTER_SIZE: u64 = 1024;

/// Pathspec matching files that `.gitattributes` routes through git-lfs.
const LFS_PATHSPEC: &str = ":(attr:filter=lfs)";

/// Check whether file content is a large-file pointer stub.
pub fn is_pointer_stub(content: &[u8]) -> bool {
    content.starts_with(POINTER_PREFIX)
}

/// Collect every pointer stub in a working tree, skipping `.git` entries.
pub fn find_pointer_stubs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut stubs = Vec::new();
    scan_dir(root, &mut stubs)?;
    stubs.sort();
    Ok(stubs)
}

/// Checked-out files of `repo` with the `filter=lfs` attribute.
///
/// Nested submodules are not included; ask each of them separately.
pub fn lfs_tracked_files(git: &GitRunner, repo: &Path) -> Result<Vec<PathBuf>> {
    let output = git.run_raw(Some(repo), &["ls-files", "-z", "--", LFS_PATHSPEC])?;
    Ok(output
        .split(|b| *b == 0)
        .filter(|name| !name.is_empty())
        .map(|name| repo.join(&*String::from_utf8_lossy(name)))
        .collect())
}

/// Keep the paths among `paths` that are still pointer stubs.
pub fn pointer_stubs_among(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut stubs = Vec::new();
    for path in paths {
        let is_file = fs::symlink_metadata(path).is_ok_and(|meta| meta.is_file());
        if is_file && file_is_pointer(path)? {
            stubs.push(path.clone());
        }
    }
    Ok(stubs)
}

fn scan_dir(dir: &Path, stubs: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        fs::read_dir(dir).io_context(|| format!("Failed to read directory: {}", dir.display()))?;
    for entry in entries {
        let entry =
            entry.io_context(|| format!("Failed to read directory entry: {}", dir.display()))?;
        if entry.file_name() == ".git" {
            continue;
        }
        let path = entry.path();
        let ty = entry
            .file_type()
            .io_context(|| format!("Failed to stat file: {}", path.display()))?;
        if ty.is_dir() {
            scan_dir(&path, stubs)?;
        } else if ty.is_file() && file_is_pointer(&path)? {
            stubs.push(path);
        }
    }
    Ok(())
}

fn file_is_pointer(path: &Path) -> Result<bool> {
    let len = fs::metadata(path)
        .io_context(|| format!("Failed to stat file: {}", path.display()))?
        .len();
    if len > MAX_POINTER_SIZE {
        return Ok(false);
    }
    let mut head = [0u8; POINTER_PREFIX.len()];
    let mut file =
        fs::File::open(path).io_context(|| format!("Failed to open file: {}", path.display()))?;
    let mut filled = 0;
    while filled < head.len() {
        let read = file
            .read(&mut head[filled..])
            .io_context(|| format!("Failed to read file: {}", path.display()))?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(is_pointer_stub(&head[..filled]))
}
