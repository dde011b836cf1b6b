//! Deterministic tree hashing for checkout reproducibility
//!
//! Two checkouts of the same commit hash to the same digest, so the digest of
//! a published tree can be compared across invocations and hosts.

use std::fs;
use std::path::Path;

use crate::error::{BridgeError, IoContext, Result};

/// Compute deterministic tree hash of a working tree
///
/// # Algorithm
/// - Recursive directory traversal, entries sorted by name
/// - `.git` entries (directories or gitfiles) are skipped at every level
/// - Files: `blake3(relative_path || 0x00 || content)`
/// - Symlinks: `relative_path || 0xFE || link target`
/// - Output: hex string
///
/// # Example
/// ```no_run
/// use scm_bridge_core::fs::tree_hash::hash_tree;
/// use std::path::Path;
///
/// let hash = hash_tree(Path::new("/path/to/checkout"))?;
/// assert_eq!(hash.len(), 64); // blake3 hex output
/// # Ok::<(), scm_bridge_core::error::BridgeError>(())
/// ```
pub fn hash_tree(path: &Path) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    hash_dir_recursive(&mut hasher, path, "")?;
    Ok(hasher.finalize().to_hex().to_string())
}

fn hash_dir_recursive(hasher: &mut blake3::Hasher, dir: &Path, base: &str) -> Result<()> {
    let entries =
        fs::read_dir(dir).io_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut sorted_entries: Vec<_> = entries
        .collect::<std::result::Result<Vec<_>, _>>()
        .io_context(|| format!("Failed to read directory entries: {}", dir.display()))?;
    sorted_entries.sort_by_key(|e| e.file_name());

    for entry in sorted_entries {
        let name = entry.file_name();
        if name == ".git" {
            continue;
        }
        let name_str = name.to_string_lossy();
        let rel_path = if base.is_empty() {
            name_str.to_string()
        } else {
            format!("{}/{}", base, name_str)
        };

        let ty = entry
            .file_type()
            .io_context(|| format!("Failed to stat file: {}", entry.path().display()))?;

        if ty.is_dir() {
            hasher.update(rel_path.as_bytes());
            hasher.update(&[0xFF]); // Directory marker
            hash_dir_recursive(hasher, &entry.path(), &rel_path)?;
        } else if ty.is_symlink() {
            let target = fs::read_link(entry.path())
                .io_context(|| format!("Failed to read link: {}", entry.path().display()))?;
            hasher.update(rel_path.as_bytes());
            hasher.update(&[0xFE]); // Symlink marker
            hasher.update(target.to_string_lossy().as_bytes());
        } else if ty.is_file() {
            hasher.update(rel_path.as_bytes());
            hasher.update(&[0x00]); // Path separator
            let content = fs::read(entry.path())
                .io_context(|| format!("Failed to read file: {}", entry.path().display()))?;
            hasher.update(&content);
        } else {
            return Err(BridgeError::io(
                format!("Unsupported filesystem entry type: {}", entry.path().display()),
                std::io::Error::from(std::io::ErrorKind::Unsupported),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn same_content_same_hash() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        for dir in [a.path(), b.path()] {
            fs::create_dir_all(dir.join("src")).unwrap();
            fs::write(dir.join("src").join("lib.c"), "int x;").unwrap();
            fs::write(dir.join("README"), "ring0").unwrap();
        }

        assert_eq!(hash_tree(a.path()).unwrap(), hash_tree(b.path()).unwrap());
    }

    #[test]
    fn content_change_changes_hash() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("README"), "one").unwrap();
        let before = hash_tree(temp.path()).unwrap();
        fs::write(temp.path().join("README"), "two").unwrap();
        assert_ne!(before, hash_tree(temp.path()).unwrap());
    }

    #[test]
    fn git_metadata_is_ignored() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("README"), "ring0").unwrap();
        let before = hash_tree(temp.path()).unwrap();

        fs::create_dir_all(temp.path().join(".git")).unwrap();
        fs::write(temp.path().join(".git").join("HEAD"), "ref: refs/heads/main\n").unwrap();
        fs::create_dir_all(temp.path().join("libeconf")).unwrap();
        fs::write(
            temp.path().join("libeconf").join(".git"),
            "gitdir: ../.git/modules/libeconf\n",
        )
        .unwrap();
        let after = hash_tree(temp.path()).unwrap();

        // only the empty libeconf directory entry differs
        fs::remove_dir_all(temp.path().join("libeconf")).unwrap();
        assert_eq!(before, hash_tree(temp.path()).unwrap());
        assert_ne!(before, after);
    }
}
