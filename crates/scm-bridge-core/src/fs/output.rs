//! Output directory checks and temp-file naming.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BridgeError, IoContext, Result};

/// Marker embedded in every temp file name written next to its destination.
const TEMP_MARKER: &str = ".tmp.";

/// State of the output directory before an invocation writes to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDirState {
    /// Does not exist yet; the invocation creates it
    Absent,
    /// Exists and has no entries
    Empty,
}

impl OutputDirState {
    pub fn created_by_us(self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Reject output directories that already carry content.
///
/// Leftover temp files from an interrupted run are reported as
/// `PartialWriteDetected`, any other content as `OutputDirectoryNotEmpty`.
pub fn prepare_output_dir(path: &Path) -> Result<OutputDirState> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(OutputDirState::Absent);
        }
        Err(err) => {
            return Err(BridgeError::io(
                format!("Failed to stat output directory: {}", path.display()),
                err,
            ));
        }
    };

    if !meta.is_dir() {
        return Err(BridgeError::OutputDirectoryNotEmpty {
            path: path.to_path_buf(),
        });
    }

    let mut has_entries = false;
    for entry in fs::read_dir(path)
        .io_context(|| format!("Failed to read output directory: {}", path.display()))?
    {
        let entry =
            entry.io_context(|| format!("Failed to read directory entry: {}", path.display()))?;
        if is_temp_name(&entry.file_name().to_string_lossy()) {
            return Err(BridgeError::partial_write(
                path,
                format!(
                    "leftover temporary file {}",
                    entry.file_name().to_string_lossy()
                ),
            ));
        }
        has_entries = true;
    }

    if has_entries {
        return Err(BridgeError::OutputDirectoryNotEmpty {
            path: path.to_path_buf(),
        });
    }
    Ok(OutputDirState::Empty)
}

/// Hidden temp path next to `dst`: `.<name>.tmp.<pid>`.
pub fn temp_path_for(dst: &Path) -> Result<PathBuf> {
    let parent = dst.parent().ok_or_else(|| {
        BridgeError::io(
            format!("Destination path has no parent: {}", dst.display()),
            std::io::Error::from(std::io::ErrorKind::InvalidInput),
        )
    })?;
    let base = dst.file_name().ok_or_else(|| {
        BridgeError::io(
            format!("Destination path has no filename: {}", dst.display()),
            std::io::Error::from(std::io::ErrorKind::InvalidInput),
        )
    })?;
    Ok(parent.join(format!(
        ".{}{}{}",
        base.to_string_lossy(),
        TEMP_MARKER,
        std::process::id()
    )))
}

/// Check whether a file name was produced by [`temp_path_for`].
pub fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.contains(TEMP_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn absent_directory_is_accepted() {
        let temp = TempDir::new().unwrap();
        let state = prepare_output_dir(&temp.path().join("out")).unwrap();
        assert_eq!(state, OutputDirState::Absent);
        assert!(state.created_by_us());
    }

    #[test]
    fn empty_directory_is_accepted() {
        let temp = TempDir::new().unwrap();
        assert_eq!(
            prepare_output_dir(temp.path()).unwrap(),
            OutputDirState::Empty
        );
    }

    #[test]
    fn populated_directory_is_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("ring0.info"), "abc\n").unwrap();
        let err = prepare_output_dir(temp.path()).unwrap_err();
        assert!(matches!(err, BridgeError::OutputDirectoryNotEmpty { .. }));
    }

    #[test]
    fn leftover_temp_file_is_a_partial_write() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".ring0.xml.tmp.4242"), "<package").unwrap();
        let err = prepare_output_dir(temp.path()).unwrap_err();
        assert!(matches!(err, BridgeError::PartialWriteDetected { .. }));
    }

    #[test]
    fn temp_names_round_trip() {
        let tmp = temp_path_for(Path::new("/out/libeconf.info")).unwrap();
        let name = tmp.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".libeconf.info.tmp."));
        assert!(is_temp_name(&name));
        assert!(!is_temp_name("libeconf.info"));
    }
}
