//! Git operations for materializing a source specification.
//!
//! This module provides:
//! - Parsing of `url[?lfs=0|1][#ref]` source strings
//! - The checkout capability and its git CLI implementation
//! - Large-file pointer detection
//! - Address helpers for relative submodule URLs and package names

mod checkout;
mod command;
mod lfs;
mod spec;
mod url;

pub use checkout::{CheckedOutRepository, CheckoutBackend, GitCliBackend, classify_remote_error};
pub use command::{GitRunner, is_commit_hash};
pub use lfs::{
    POINTER_PREFIX, find_pointer_stubs, is_pointer_stub, lfs_tracked_files, pointer_stubs_among,
};
pub use spec::{LfsMode, SourceSpec};
pub use url::{
    is_local_path, is_relative_url, is_scp_like, repository_name, resolve_submodule_url,
};
