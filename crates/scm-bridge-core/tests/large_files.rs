//! Integration tests for the `lfs` switch of a source specification.
#![cfg(unix)]

mod support;

use std::fs;
use std::path::{Path, PathBuf};

use scm_bridge_core::prelude::*;
use support::git::{add_submodule, commit_file, init_repo};
use support::lfs::{ATTRIBUTES, CONTENT, FakeLfs, POINTER};
use tempfile::TempDir;

fn run_flat(lfs: &FakeLfs, url: &str, out: &Path) -> Result<BridgeOutcome> {
    let spec = SourceSpec::parse(url)?;
    let ctx = BridgeContext::new().with_git_program(lfs.git_program());
    Bridge::new(ctx).run(&BridgeRequest::new(spec, out, OutputMode::Flat))
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

/// Repository with one lfs-tracked archive stored as a pointer.
fn lfs_repo(dir: &Path, archive: &str) -> PathBuf {
    init_repo(dir);
    fs::write(dir.join(".gitattributes"), ATTRIBUTES).unwrap();
    commit_file(dir, archive, POINTER, "add archive");
    dir.to_path_buf()
}

#[test]
fn opt_out_leaves_pointer_in_place() {
    let temp = TempDir::new().unwrap();
    let lfs = FakeLfs::install(temp.path());
    let source = lfs_repo(&temp.path().join("git-example-lfs"), "orangebox-0.2.0.tar.gz");

    let out = temp.path().join("out");
    run_flat(&lfs, &format!("{}?lfs=0", path_str(&source)), &out).unwrap();

    assert_eq!(
        fs::read_to_string(out.join("orangebox-0.2.0.tar.gz")).unwrap(),
        POINTER
    );
    // the filter ran and was told to skip
    assert!(lfs.calls_to("smudge") >= 1, "{:?}", lfs.calls());
    assert_eq!(lfs.calls_to("pull"), 0);
}

#[test]
fn default_mode_uses_the_configured_filter() {
    let temp = TempDir::new().unwrap();
    let lfs = FakeLfs::install(temp.path());
    let source = lfs_repo(&temp.path().join("git-example-lfs"), "orangebox-0.2.0.tar.gz");

    let out = temp.path().join("out");
    run_flat(&lfs, path_str(&source), &out).unwrap();

    assert_eq!(
        fs::read_to_string(out.join("orangebox-0.2.0.tar.gz")).unwrap(),
        CONTENT
    );
    assert_eq!(lfs.calls_to("pull"), 0);
}

#[test]
fn opt_in_pulls_root_and_submodules() {
    let temp = TempDir::new().unwrap();
    let lfs = FakeLfs::install(temp.path());
    let rpms = temp.path().join("rpms");
    lfs_repo(&rpms.join("libeconf"), "econf-data.tar.gz");
    let ring0 = lfs_repo(&rpms.join("ring0"), "ring0-assets.tar.gz");
    add_submodule(&ring0, "../libeconf", "libeconf");

    let out = temp.path().join("out");
    run_flat(&lfs, &format!("{}?lfs=1", path_str(&ring0)), &out).unwrap();

    assert_eq!(
        fs::read_to_string(out.join("ring0-assets.tar.gz")).unwrap(),
        CONTENT
    );
    assert_eq!(
        fs::read_to_string(out.join("libeconf").join("econf-data.tar.gz")).unwrap(),
        CONTENT
    );
    assert_eq!(lfs.calls_to("pull"), 2, "{:?}", lfs.calls());
}

#[test]
fn opt_in_without_tracked_files_never_runs_git_lfs() {
    let temp = TempDir::new().unwrap();
    let lfs = FakeLfs::install(temp.path());
    let source = temp.path().join("ring0");
    init_repo(&source);
    // looks like a pointer but no attribute hands it to git-lfs
    commit_file(&source, "pointer-example.txt", POINTER, "docs");

    let out = temp.path().join("out");
    run_flat(&lfs, &format!("{}?lfs=1", path_str(&source)), &out).unwrap();

    assert_eq!(
        fs::read_to_string(out.join("pointer-example.txt")).unwrap(),
        POINTER
    );
    assert!(lfs.calls().is_empty(), "{:?}", lfs.calls());
}

#[test]
fn opt_in_fails_when_content_stays_missing() {
    let temp = TempDir::new().unwrap();
    let lfs = FakeLfs::install(temp.path());
    let source = lfs_repo(&temp.path().join("ring0"), "firmware.unfetchable");

    let out = temp.path().join("out");
    let err = run_flat(&lfs, &format!("{}?lfs=1", path_str(&source)), &out).unwrap_err();

    assert!(
        matches!(err, BridgeError::LargeFileFetch { ref reason } if reason.contains("firmware.unfetchable")),
        "{err}"
    );
    assert_eq!(err.exit_code(), 3);
    assert!(!out.exists());
}
