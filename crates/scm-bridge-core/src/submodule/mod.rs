//! First-level submodule discovery.
//!
//! The table is read as committed in the superproject's `HEAD` tree and the
//! pinned commit of each submodule comes from the gitlink entry at its path,
//! so the result never depends on what the working tree happens to contain.

mod gitmodules;


use std::path::Path;

use git2::{ObjectType, Repository};
use tracing::{debug, instrument};

use crate::error::{BridgeError, Result};
use crate::git::resolve_submodule_url;

pub use gitmodules::{SubmoduleDecl, parse_gitmodules};

const GITMODULES: &str = ".gitmodules";

/// A submodule pinned by its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleRef {
    /// Name from the table, unique within the parent
    pub name: String,
    /// Path of the gitlink inside the parent tree
    pub path: String,
    /// Fetchable URL, relative forms already resolved
    pub url: String,
    /// Commit recorded by the parent's gitlink
    pub head_commit: String,
}

/// Resolve declared submodules against the parent's URL and gitlinks.
///
/// `gitlink` maps a declared path to the commit recorded there, if any.
pub fn resolve_declarations<F>(
    decls: Vec<SubmoduleDecl>,
    base_url: &str,
    gitlink: F,
) -> Result<Vec<SubmoduleRef>>
where
    F: Fn(&str) -> Option<String>,
{
    decls
        .into_iter()
        .map(|decl| {
            let url = resolve_submodule_url(base_url, &decl.url)?;
            let head_commit = gitlink(&decl.path).ok_or_else(|| {
                BridgeError::malformed_table(format!(
                    "submodule '{}' declares path '{}' but the tree has no gitlink there",
                    decl.name, decl.path
                ))
            })?;
            Ok(SubmoduleRef {
                name: decl.name,
                path: decl.path,
                url,
                head_commit,
            })
        })
        .collect()
}

/// Discover the first-level submodules of the repository checked out at `root`.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn discover(root: &Path, base_url: &str) -> Result<Vec<SubmoduleRef>> {
    let repo = Repository::open(root)?;
    let tree = repo.head()?.peel_to_tree()?;

    let Some(entry) = tree.get_name(GITMODULES) else {
        debug!("no submodule table");
        return Ok(Vec::new());
    };
    let object = entry.to_object(&repo)?;
    let blob = object
        .as_blob()
        .ok_or_else(|| BridgeError::malformed_table(format!("{GITMODULES} is not a file")))?;
    let text = std::str::from_utf8(blob.content())
        .map_err(|_| BridgeError::malformed_table(format!("{GITMODULES} is not valid UTF-8")))?;

    let decls = parse_gitmodules(text)?;
    debug!(count = decls.len(), "parsed submodule table");

    resolve_declarations(decls, base_url, |path| {
        tree.get_path(Path::new(path))
            .ok()
            .filter(|entry| entry.kind() == Some(ObjectType::Commit))
            .map(|entry| entry.id().to_string())
    })
}
