//! Filesystem primitives shared across pipeline stages.

pub mod output;
pub mod publish;
pub mod tree_hash;

pub use output::{OutputDirState, is_temp_name, prepare_output_dir, temp_path_for};
pub use publish::publish_tree;
pub use tree_hash::hash_tree;
