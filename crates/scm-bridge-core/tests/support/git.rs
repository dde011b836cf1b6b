#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

const GIT_ENV_OVERRIDES: [&str; 4] = [
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_COMMON_DIR",
];

/// git with a fixed identity and no ambient repository overrides.
pub fn git_command() -> Command {
    let mut cmd = Command::new("git");
    for key in GIT_ENV_OVERRIDES {
        cmd.env_remove(key);
    }
    cmd.env("GIT_AUTHOR_NAME", "Bridge Test")
        .env("GIT_AUTHOR_EMAIL", "bridge@example.com")
        .env("GIT_COMMITTER_NAME", "Bridge Test")
        .env("GIT_COMMITTER_EMAIL", "bridge@example.com")
        .env("GIT_TERMINAL_PROMPT", "0")
        .args(["-c", "protocol.file.allow=always"])
        .args(["-c", "init.defaultBranch=main"])
        .args(["-c", "commit.gpgsign=false"])
        .args(["-c", "tag.gpgsign=false"]);
    cmd
}

/// Run git in `dir`, panicking on failure; returns trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = git_command()
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to invoke git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn init_repo(dir: &Path) {
    std::fs::create_dir_all(dir).expect("Failed to create repo dir");
    git(dir, &["init", "--quiet"]);
}

/// Write `rel` with `contents`, commit everything and return the new HEAD.
pub fn commit_file(dir: &Path, rel: &str, contents: &str, message: &str) -> String {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    std::fs::write(&path, contents).expect("Failed to write file");
    git(dir, &["add", "--all"]);
    git(dir, &["commit", "--quiet", "-m", message]);
    head(dir)
}

pub fn head(dir: &Path) -> String {
    git(dir, &["rev-parse", "HEAD"])
}

/// `git submodule add <url> <path>` followed by a commit.
pub fn add_submodule(parent: &Path, url: &str, path: &str) {
    git(parent, &["submodule", "add", "--quiet", url, path]);
    git(parent, &["commit", "--quiet", "-m", &format!("add {path}")]);
}

/// Record a gitlink for `commit` at `path` without cloning anything.
pub fn add_gitlink(parent: &Path, path: &str, commit: &str) {
    git(
        parent,
        &[
            "update-index",
            "--add",
            "--cacheinfo",
            &format!("160000,{commit},{path}"),
        ],
    );
}
