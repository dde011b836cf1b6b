pub mod git;
#[cfg(unix)]
pub mod lfs;
