//! Checkout of a source specification at an exact commit.
//!
//! The checkout capability is the [`CheckoutBackend`] trait; [`GitCliBackend`]
//! implements it by driving the `git` executable (and `git lfs` for large
//! files), which owns the transfer protocols.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use super::command::{GitRunner, is_commit_hash};
use super::lfs::{lfs_tracked_files, pointer_stubs_among};
use super::spec::{LfsMode, SourceSpec};
use super::url::is_local_path;
use crate::context::Deadline;
use crate::error::{BridgeError, Result};
use crate::submodule::SubmoduleRef;

const LFS_SKIP_SMUDGE: &str = "GIT_LFS_SKIP_SMUDGE";

/// A working tree pinned at a resolved commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedOutRepository {
    /// Root of the working tree
    pub root_path: PathBuf,
    /// Commit read back from the working tree after checkout
    pub head_commit: String,
    /// First-level submodules in declaration order; filled by discovery
    pub submodules: Vec<SubmoduleRef>,
}

impl CheckedOutRepository {
    pub fn new(root_path: PathBuf, head_commit: String) -> Self {
        Self {
            root_path,
            head_commit,
            submodules: Vec::new(),
        }
    }

    pub fn with_submodules(mut self, submodules: Vec<SubmoduleRef>) -> Self {
        self.submodules = submodules;
        self
    }
}

/// Produces a working tree for a source specification.
pub trait CheckoutBackend {
    /// Materialize `spec` into `dest`, which must not exist yet, including
    /// nested submodule content.
    fn checkout(
        &self,
        spec: &SourceSpec,
        dest: &Path,
        deadline: &Deadline,
    ) -> Result<CheckedOutRepository>;

    /// Like [`checkout`](Self::checkout) but only the superproject's own
    /// commit is needed; backends may skip submodule and large-file content.
    fn checkout_superproject(
        &self,
        spec: &SourceSpec,
        dest: &Path,
        deadline: &Deadline,
    ) -> Result<CheckedOutRepository> {
        self.checkout(spec, dest, deadline)
    }
}

/// Checkout backend that shells out to git.
#[derive(Debug, Clone)]
pub struct GitCliBackend {
    program: PathBuf,
    allow_file_protocol: bool,
}

impl GitCliBackend {
    pub fn new(program: PathBuf, allow_file_protocol: bool) -> Self {
        Self {
            program,
            allow_file_protocol,
        }
    }

    fn runner(&self, spec: &SourceSpec, deadline: &Deadline) -> GitRunner {
        let mut git = GitRunner::new(&self.program, *deadline);
        if self.allow_file_protocol && is_local_path(&spec.base_url) {
            git = git.with_config("protocol.file.allow=always");
        }
        match spec.lfs_mode {
            LfsMode::Auto => git,
            // ForceOn skips the smudge during checkout and pulls explicitly afterwards
            LfsMode::ForceOff | LfsMode::ForceOn => git.with_env(LFS_SKIP_SMUDGE, "1"),
        }
    }

    /// Resolve the requested ref inside a fresh clone.
    fn resolve_reference(&self, git: &GitRunner, repo: &Path, spec: &SourceSpec) -> Result<String> {
        let not_found = |reference: &str| BridgeError::RefNotFound {
            url: spec.base_url.clone(),
            reference: reference.to_string(),
        };

        let Some(reference) = spec.reference.as_deref() else {
            return git
                .rev_parse_commit(repo, "HEAD")?
                .ok_or_else(|| not_found("HEAD"));
        };

        let candidates = [
            format!("refs/remotes/origin/{reference}"),
            format!("refs/tags/{reference}"),
            reference.to_string(),
        ];
        for candidate in &candidates {
            if let Some(commit) = git.rev_parse_commit(repo, candidate)? {
                debug!(reference, candidate = %candidate, commit = %commit, "resolved reference");
                return Ok(commit);
            }
        }

        // Full refnames outside refs/heads and refs/tags, and commits not
        // reachable from any advertised ref, need an explicit fetch
        let fetched = git.output(Some(repo), &["fetch", "--quiet", "origin", reference])?;
        if fetched.status.success()
            && let Some(commit) = git.rev_parse_commit(repo, "FETCH_HEAD")?
        {
            debug!(reference, commit = %commit, "resolved reference by fetch");
            return Ok(commit);
        }
        debug!(
            reference,
            stderr = %String::from_utf8_lossy(&fetched.stderr).trim(),
            "reference not on remote"
        );

        Err(not_found(reference))
    }

    fn materialize_large_files(&self, git: &GitRunner, repo: &Path) -> Result<()> {
        let git = git.clone().without_env(LFS_SKIP_SMUDGE);
        let lfs_failed = |err: BridgeError| BridgeError::LargeFileFetch {
            reason: err.to_string(),
        };

        let nested = git.run(
            Some(repo),
            &["submodule", "foreach", "--quiet", "--recursive", "pwd"],
        )?;
        let repos = std::iter::once(repo.to_path_buf())
            .chain(nested.lines().filter(|l| !l.is_empty()).map(PathBuf::from));

        // Repositories without lfs-tracked files never need git-lfs installed
        let mut stubs = Vec::new();
        for dir in repos {
            let tracked = lfs_tracked_files(&git, &dir)?;
            if tracked.is_empty() {
                debug!(repo = %dir.display(), "no large files tracked");
                continue;
            }
            info!(repo = %dir.display(), count = tracked.len(), "fetching large file content");
            git.run(Some(&dir), &["lfs", "pull"]).map_err(lfs_failed)?;
            stubs.extend(pointer_stubs_among(&tracked)?);
        }

        if let Some(first) = stubs.first() {
            return Err(BridgeError::LargeFileFetch {
                reason: format!(
                    "{} pointer file(s) left unmaterialized, first: {}",
                    stubs.len(),
                    first.strip_prefix(repo).unwrap_or(first).display()
                ),
            });
        }
        Ok(())
    }

    fn clone_at(
        &self,
        spec: &SourceSpec,
        dest: &Path,
        deadline: &Deadline,
        with_content: bool,
    ) -> Result<CheckedOutRepository> {
        let git = self.runner(spec, deadline);
        let dest_arg = GitRunner::path_arg(dest)?;

        info!(dest = %dest.display(), "cloning repository");
        git.run(
            None,
            &[
                "clone",
                "--no-checkout",
                "--quiet",
                "--",
                &spec.base_url,
                dest_arg,
            ],
        )
        .map_err(|err| classify_remote_error(err, &spec.base_url))?;

        let commit = self.resolve_reference(&git, dest, spec)?;
        info!(commit = %commit, "checking out");
        git.run(Some(dest), &["checkout", "--quiet", "--detach", &commit])?;

        if with_content {
            git.run(
                Some(dest),
                &["submodule", "update", "--init", "--recursive", "--quiet"],
            )
            .map_err(|err| classify_remote_error(err, &spec.base_url))?;

            if spec.lfs_mode == LfsMode::ForceOn {
                self.materialize_large_files(&git, dest)?;
            }
        }

        let head_commit = git.run(Some(dest), &["rev-parse", "HEAD"])?;
        if !is_commit_hash(&head_commit) {
            return Err(BridgeError::GitCommand {
                args: "rev-parse HEAD".to_string(),
                stderr: format!("unexpected commit id '{head_commit}'"),
            });
        }
        if head_commit != commit {
            warn!(expected = %commit, actual = %head_commit, "HEAD differs from resolved ref");
        }

        Ok(CheckedOutRepository::new(dest.to_path_buf(), head_commit))
    }
}

impl CheckoutBackend for GitCliBackend {
    #[instrument(skip(self, deadline), fields(url = %spec.base_url, lfs = ?spec.lfs_mode))]
    fn checkout(
        &self,
        spec: &SourceSpec,
        dest: &Path,
        deadline: &Deadline,
    ) -> Result<CheckedOutRepository> {
        self.clone_at(spec, dest, deadline, true)
    }

    #[instrument(skip(self, deadline), fields(url = %spec.base_url))]
    fn checkout_superproject(
        &self,
        spec: &SourceSpec,
        dest: &Path,
        deadline: &Deadline,
    ) -> Result<CheckedOutRepository> {
        self.clone_at(spec, dest, deadline, false)
    }
}

type ErrorCheck = fn(&str) -> bool;

/// stderr fragments that mean the remote itself could not be used.
const REMOTE_FAILURES: &[(ErrorCheck, &str)] = &[
    (
        |msg| {
            msg.contains("does not appear to be a git repository")
                || msg.contains("not found")
                || msg.contains("does not exist")
        },
        "repository not found",
    ),
    (
        |msg| msg.contains("could not resolve host") || msg.contains("unable to access"),
        "host unreachable",
    ),
    (
        |msg| {
            msg.contains("connection refused")
                || msg.contains("connection timed out")
                || msg.contains("network is unreachable")
        },
        "network error",
    ),
    (
        |msg| {
            msg.contains("authentication failed")
                || msg.contains("permission denied")
                || msg.contains("could not read username")
        },
        "authentication failed",
    ),
    (
        |msg| msg.contains("transport 'file' not allowed"),
        "file transport not allowed",
    ),
];

/// Turn remote-side git failures into `RemoteUnreachable`; other errors pass through.
pub fn classify_remote_error(err: BridgeError, url: &str) -> BridgeError {
    let BridgeError::GitCommand { stderr, .. } = &err else {
        return err;
    };
    let lowered = stderr.to_lowercase();
    for (check, label) in REMOTE_FAILURES {
        if check(&lowered) {
            return BridgeError::RemoteUnreachable {
                url: url.to_string(),
                reason: format!("{label}: {}", stderr.lines().last().unwrap_or_default()),
            };
        }
    }
    err
}
