//! The bridge pipeline: parse, checkout, discover, then flat or project output.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::context::{BridgeContext, Deadline};
use crate::error::{BridgeError, IoContext, Result};
use crate::fs::{hash_tree, prepare_output_dir, publish_tree};
use crate::git::{
    CheckedOutRepository, CheckoutBackend, GitCliBackend, LfsMode, SourceSpec, find_pointer_stubs,
};
use crate::mode::OutputMode;
use crate::package::{
    PackageDescriptor, PackageEmitter, project_descriptors, root_package_name, verify_output,
};
use crate::submodule::discover;

const STAGING_PREFIX: &str = ".scm-bridge-";
const CHECKOUT_DIR: &str = "checkout";

/// One invocation's inputs.
#[derive(Debug, Clone)]
pub struct BridgeRequest {
    pub spec: SourceSpec,
    pub out_dir: PathBuf,
    pub mode: OutputMode,
}

impl BridgeRequest {
    pub fn new(spec: SourceSpec, out_dir: impl Into<PathBuf>, mode: OutputMode) -> Self {
        Self {
            spec,
            out_dir: out_dir.into(),
            mode,
        }
    }
}

/// What a successful invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// The tree was published; `tree_digest` covers everything but `.git`
    Flat {
        head_commit: String,
        tree_digest: String,
    },
    /// Metadata was written for these packages, root first
    Project { packages: Vec<PackageDescriptor> },
}

/// Runs invocations against a checkout backend.
pub struct Bridge<B: CheckoutBackend = GitCliBackend> {
    ctx: BridgeContext,
    backend: B,
}

impl Bridge<GitCliBackend> {
    pub fn new(ctx: BridgeContext) -> Self {
        let backend = ctx.checkout_backend();
        Self { ctx, backend }
    }
}

impl<B: CheckoutBackend> Bridge<B> {
    pub fn with_backend(ctx: BridgeContext, backend: B) -> Self {
        Self { ctx, backend }
    }

    pub fn context(&self) -> &BridgeContext {
        &self.ctx
    }

    /// Run one invocation.
    ///
    /// The output directory must be absent or empty. On failure nothing this
    /// call wrote is left behind, including the directory itself when this
    /// call created it.
    #[instrument(skip_all, fields(spec = %request.spec, mode = %request.mode))]
    pub fn run(&self, request: &BridgeRequest) -> Result<BridgeOutcome> {
        let deadline = self.ctx.deadline();
        let state = prepare_output_dir(&request.out_dir)?;

        let result = self.run_stages(request, &deadline);
        if let Err(err) = &result {
            warn!(error = %err, "invocation failed");
            if state.created_by_us()
                && request.out_dir.exists()
                && let Err(cleanup) = fs::remove_dir_all(&request.out_dir)
            {
                warn!(
                    out_dir = %request.out_dir.display(),
                    error = %cleanup,
                    "failed to remove output directory"
                );
            }
        }
        result
    }

    fn run_stages(&self, request: &BridgeRequest, deadline: &Deadline) -> Result<BridgeOutcome> {
        let spec = &request.spec;
        // fail on an unusable package name before any network traffic
        let root_name = match request.mode {
            OutputMode::Project => Some(root_package_name(&spec.base_url)?),
            OutputMode::Flat => None,
        };

        let staging = staging_dir(&request.out_dir)?;
        let dest = staging.path().join(CHECKOUT_DIR);
        // project mode only reads the superproject's tree
        let checkout = match request.mode {
            OutputMode::Flat => self.backend.checkout(spec, &dest, deadline)?,
            OutputMode::Project => self.backend.checkout_superproject(spec, &dest, deadline)?,
        };
        info!(commit = %checkout.head_commit, "checked out");
        deadline.check()?;

        match root_name {
            None => self.publish_flat(spec, checkout, &request.out_dir, deadline),
            Some(root_name) => {
                self.emit_project(spec, root_name, checkout, &request.out_dir, deadline)
            }
        }
    }

    fn publish_flat(
        &self,
        spec: &SourceSpec,
        checkout: CheckedOutRepository,
        out_dir: &Path,
        deadline: &Deadline,
    ) -> Result<BridgeOutcome> {
        if spec.lfs_mode == LfsMode::ForceOff {
            let stubs = find_pointer_stubs(&checkout.root_path)?;
            debug!(count = stubs.len(), "large file pointers left in place");
        }

        let tree_digest = hash_tree(&checkout.root_path)?;
        deadline.check()?;
        publish_tree(&checkout.root_path, out_dir)?;
        info!(out_dir = %out_dir.display(), digest = %tree_digest, "published tree");

        Ok(BridgeOutcome::Flat {
            head_commit: checkout.head_commit,
            tree_digest,
        })
    }

    fn emit_project(
        &self,
        spec: &SourceSpec,
        root_name: String,
        checkout: CheckedOutRepository,
        out_dir: &Path,
        deadline: &Deadline,
    ) -> Result<BridgeOutcome> {
        let submodules = discover(&checkout.root_path, &spec.base_url)?;
        let checkout = checkout.with_submodules(submodules);
        info!(count = checkout.submodules.len(), "discovered submodules");
        deadline.check()?;

        let root = PackageDescriptor {
            name: root_name,
            url: spec.base_url.clone(),
            head_commit: checkout.head_commit.clone(),
        };
        let packages = project_descriptors(root, &checkout.submodules)?;

        let emitter = PackageEmitter::new(out_dir, self.ctx.workers());
        let written = emitter.emit(&packages)?;

        let checked = deadline
            .check()
            .and_then(|()| verify_output(out_dir))
            .and_then(|count| {
                if count == packages.len() && written.len() == 2 * count {
                    Ok(())
                } else {
                    Err(BridgeError::partial_write(
                        out_dir,
                        format!(
                            "expected {} packages, found {count}",
                            packages.len()
                        ),
                    ))
                }
            });
        if let Err(err) = checked {
            emitter.rollback(&written);
            return Err(err);
        }

        Ok(BridgeOutcome::Project { packages })
    }
}

/// Staging directory next to the output so the final move is a rename.
///
/// A parent that does not take new entries falls back to the system temp
/// dir; publishing then copies into the output directory.
fn staging_dir(out_dir: &Path) -> Result<tempfile::TempDir> {
    let parent = match out_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .io_context(|| format!("Failed to create directory: {}", parent.display()))?;

    let mut builder = tempfile::Builder::new();
    builder.prefix(STAGING_PREFIX);
    match builder.tempdir_in(parent) {
        Ok(dir) => Ok(dir),
        Err(err) => {
            debug!(parent = %parent.display(), error = %err, "staging in the system temp dir");
            builder
                .tempdir()
                .io_context(|| "Failed to create staging directory in the temp dir")
        }
    }
}
