//! Atomic emission of package metadata files.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use tracing::{debug, info, instrument, warn};

use super::PackageDescriptor;
use crate::error::{BridgeError, IoContext, Result};
use crate::fs::temp_path_for;

/// Writes `<name>.info` and `<name>.xml` for each package into one directory.
///
/// Packages are spread over a bounded pool of scoped worker threads. Each
/// file goes to a hidden temp name first and is renamed into place, the
/// `.xml` last, so a package is only complete once its `.xml` exists.
#[derive(Debug, Clone)]
pub struct PackageEmitter {
    out_dir: PathBuf,
    workers: usize,
}

/// Outcome of one worker: files it published and the first failure it hit.
type WorkerResult = (Vec<PathBuf>, Option<(usize, BridgeError)>);

impl PackageEmitter {
    pub fn new(out_dir: impl Into<PathBuf>, workers: usize) -> Self {
        Self {
            out_dir: out_dir.into(),
            workers: workers.max(1),
        }
    }

    /// Emit all packages; returns every file written.
    ///
    /// On failure all files written by this call are removed again and the
    /// error of the earliest failing package is returned.
    #[instrument(skip_all, fields(out_dir = %self.out_dir.display(), packages = packages.len()))]
    pub fn emit(&self, packages: &[PackageDescriptor]) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.out_dir).io_context(|| {
            format!("Failed to create output directory: {}", self.out_dir.display())
        })?;

        let next = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);
        let worker_count = self.workers.min(packages.len()).max(1);

        let results: Vec<WorkerResult> = thread::scope(|scope| {
            let handles: Vec<_> = (0..worker_count)
                .map(|_| {
                    scope.spawn(|| {
                        let mut written = Vec::new();
                        while !failed.load(Ordering::SeqCst) {
                            let index = next.fetch_add(1, Ordering::SeqCst);
                            let Some(package) = packages.get(index) else {
                                break;
                            };
                            match self.write_package(package) {
                                Ok(files) => written.extend(files),
                                Err(err) => {
                                    failed.store(true, Ordering::SeqCst);
                                    return (written, Some((index, err)));
                                }
                            }
                        }
                        (written, None)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(result) => result,
                    Err(payload) => std::panic::resume_unwind(payload),
                })
                .collect()
        });

        let mut written = Vec::new();
        let mut first_error: Option<(usize, BridgeError)> = None;
        for (files, error) in results {
            written.extend(files);
            if let Some((index, err)) = error
                && first_error.as_ref().is_none_or(|(first, _)| index < *first)
            {
                first_error = Some((index, err));
            }
        }

        if let Some((index, err)) = first_error {
            warn!(package = %packages[index].name, error = %err, "emission failed, rolling back");
            self.rollback(&written);
            return Err(err);
        }

        written.sort();
        info!(files = written.len(), "package metadata written");
        Ok(written)
    }

    /// Remove files published by an earlier [`emit`](Self::emit).
    pub fn rollback(&self, files: &[PathBuf]) {
        for file in files {
            if let Err(err) = fs::remove_file(file)
                && err.kind() != std::io::ErrorKind::NotFound
            {
                warn!(file = %file.display(), error = %err, "failed to remove emitted file");
            }
        }
    }

    fn write_package(&self, package: &PackageDescriptor) -> Result<Vec<PathBuf>> {
        let info_path = self.out_dir.join(package.info_file_name());
        let xml_path = self.out_dir.join(package.xml_file_name());
        let info_tmp = temp_path_for(&info_path)?;
        let xml_tmp = temp_path_for(&xml_path)?;

        let mut published = Vec::with_capacity(2);
        let result = (|| -> Result<()> {
            write_synced(&info_tmp, package.render_info().as_bytes())?;
            write_synced(&xml_tmp, package.render_xml().as_bytes())?;
            rename(&info_tmp, &info_path)?;
            published.push(info_path.clone());
            rename(&xml_tmp, &xml_path)?;
            published.push(xml_path.clone());
            Ok(())
        })();

        if let Err(err) = result {
            for path in [&info_tmp, &xml_tmp].into_iter().chain(published.iter()) {
                let _ = fs::remove_file(path);
            }
            return Err(err);
        }

        debug!(package = %package.name, commit = %package.head_commit, "emitted package");
        Ok(published)
    }
}

fn write_synced(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file =
        File::create(path).io_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(contents)
        .io_context(|| format!("Failed to write {}", path.display()))?;
    file.sync_all()
        .io_context(|| format!("Failed to sync {}", path.display()))
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).io_context(|| {
        format!(
            "Failed to move {} into place at {}",
            from.display(),
            to.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn package(name: &str, commit_digit: char) -> PackageDescriptor {
        PackageDescriptor {
            name: name.to_string(),
            url: format!("/src/rpms/{name}"),
            head_commit: std::iter::repeat_n(commit_digit, 40).collect(),
        }
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn writes_two_files_per_package() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let packages = vec![
            package("ring0", '1'),
            package("aaa_base", '2'),
            package("libeconf", '3'),
        ];

        let written = PackageEmitter::new(&out, 2).emit(&packages).unwrap();

        assert_eq!(written.len(), 6);
        assert_eq!(
            listing(&out),
            [
                "aaa_base.info",
                "aaa_base.xml",
                "libeconf.info",
                "libeconf.xml",
                "ring0.info",
                "ring0.xml"
            ]
        );
        assert_eq!(
            fs::read_to_string(out.join("libeconf.info")).unwrap(),
            format!("{}\n", "3".repeat(40))
        );
    }

    #[test]
    fn more_workers_than_packages() {
        let temp = TempDir::new().unwrap();
        let written = PackageEmitter::new(temp.path(), 16)
            .emit(&[package("ring0", 'a')])
            .unwrap();
        assert_eq!(written.len(), 2);
    }

    #[test]
    fn failure_rolls_back_everything() {
        let temp = TempDir::new().unwrap();
        // a directory where a file must go makes the rename fail
        fs::create_dir_all(temp.path().join("broken.xml").join("occupied")).unwrap();
        let packages = vec![
            package("ring0", '1'),
            package("broken", '2'),
            package("libeconf", '3'),
        ];

        let err = PackageEmitter::new(temp.path(), 1)
            .emit(&packages)
            .unwrap_err();

        assert!(matches!(err, BridgeError::Io { .. }), "unexpected error: {err}");
        assert_eq!(listing(temp.path()), ["broken.xml"]);
    }

    #[test]
    fn rollback_tolerates_missing_files() {
        let temp = TempDir::new().unwrap();
        let emitter = PackageEmitter::new(temp.path(), 1);
        let written = emitter.emit(&[package("ring0", '1')]).unwrap();
        fs::remove_file(&written[0]).unwrap();
        emitter.rollback(&written);
        assert!(listing(temp.path()).is_empty());
    }
}
