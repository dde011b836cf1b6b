#![allow(dead_code)]

//! A stand-in `git-lfs` that records how it was called.
//!
//! Pointer files are committed as-is by the fixture git (which has no lfs
//! filter configured), exactly as a real lfs repository stores them. The
//! bridge is pointed at a `git` wrapper that configures the lfs filter and
//! puts the stand-in first on `PATH`.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const POINTER: &str = "version https://git-lfs.github.com/spec/v1\n\
    oid sha256:4d7a214614ab2935c943f9e0ff69d22eadbb8f32b1258daaa5e2ca24d17e2393\n\
    size 104857\n";

/// What the stand-in writes in place of a pointer.
pub const CONTENT: &str = "large file content\n";

/// Tracked files with this suffix are never materialized by `pull`.
pub const UNFETCHABLE_SUFFIX: &str = ".unfetchable";

pub const ATTRIBUTES: &str = "*.tar.gz filter=lfs diff=lfs merge=lfs -text\n\
    *.unfetchable filter=lfs diff=lfs merge=lfs -text\n";

pub struct FakeLfs {
    git: PathBuf,
    log: PathBuf,
}

impl FakeLfs {
    pub fn install(dir: &Path) -> Self {
        let bin = dir.join("lfs-bin");
        fs::create_dir_all(&bin).unwrap();
        let log = dir.join("git-lfs.log");

        write_script(
            &bin.join("git-lfs"),
            &format!(
                r#"#!/bin/sh
echo "$*" >> '{log}'
case "$1" in
  smudge)
    if [ "$GIT_LFS_SKIP_SMUDGE" = "1" ]; then
      cat
    else
      cat > /dev/null
      echo 'large file content'
    fi
    ;;
  clean)
    cat
    ;;
  pull)
    git ls-files -- ':(attr:filter=lfs)' | while IFS= read -r f; do
      case "$f" in
        *{suffix}) ;;
        *) echo 'large file content' > "$f" ;;
      esac
    done
    ;;
esac
"#,
                log = log.display(),
                suffix = UNFETCHABLE_SUFFIX,
            ),
        );

        let git = dir.join("git-with-lfs");
        write_script(
            &git,
            &format!(
                r#"#!/bin/sh
PATH='{bin}':"$PATH"
GIT_CONFIG_GLOBAL=/dev/null
GIT_CONFIG_NOSYSTEM=1
export PATH GIT_CONFIG_GLOBAL GIT_CONFIG_NOSYSTEM
exec git -c 'filter.lfs.smudge=git-lfs smudge -- %f' \
  -c 'filter.lfs.clean=git-lfs clean -- %f' \
  -c filter.lfs.required=true "$@"
"#,
                bin = bin.display(),
            ),
        );

        Self { git, log }
    }

    /// The git program the bridge should run.
    pub fn git_program(&self) -> &Path {
        &self.git
    }

    /// Every recorded `git-lfs` invocation, one argument string per line.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn calls_to(&self, command: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split_whitespace().next() == Some(command))
            .count()
    }
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}
