//! scm-bridge core library
//!
//! Checks out a git source specification at an exact commit and turns it
//! into build-service input: either the working tree itself, or package
//! metadata for the repository and each of its first-level submodules.

pub mod bridge;
pub mod config;
pub mod context;
pub mod error;
pub mod fs;
pub mod git;
pub mod mode;
pub mod package;
pub mod submodule;

/// Re-exports of commonly used types
pub mod prelude {
    // Pipeline
    pub use crate::bridge::{Bridge, BridgeOutcome, BridgeRequest};
    pub use crate::context::{BridgeContext, Deadline};
    pub use crate::mode::OutputMode;

    // Configuration and errors
    pub use crate::config::BridgeConfig;
    pub use crate::error::{BridgeError, Result};

    // Git
    pub use crate::git::{CheckedOutRepository, CheckoutBackend, GitCliBackend, LfsMode, SourceSpec};

    // Metadata
    pub use crate::package::{PackageDescriptor, PackageEmitter, verify_output};
    pub use crate::submodule::SubmoduleRef;
}
