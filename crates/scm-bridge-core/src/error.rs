//! Error types for the bridge pipeline.
//!
//! Every failure is terminal for the current invocation. Each variant carries a
//! stable message and maps to one of the exit-code families of the CLI.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed source specification '{input}': {reason}")]
    MalformedSpec { input: String, reason: String },

    #[error("reference '{reference}' not found in {url}")]
    RefNotFound { url: String, reference: String },

    #[error("remote {url} is unreachable: {reason}")]
    RemoteUnreachable { url: String, reason: String },

    #[error("duplicate submodule name '{name}'")]
    DuplicateSubmoduleName { name: String },

    #[error("malformed submodule table: {reason}")]
    MalformedSubmoduleTable { reason: String },

    #[error("output directory is not empty: {}", path.display())]
    OutputDirectoryNotEmpty { path: PathBuf },

    #[error("partial write detected in {}: {reason}", path.display())]
    PartialWriteDetected { path: PathBuf, reason: String },

    #[error("large file content could not be materialized: {reason}")]
    LargeFileFetch { reason: String },

    #[error("git {args} failed: {stderr}")]
    GitCommand { args: String, stderr: String },

    #[error("failed to read repository: {0}")]
    Git(#[from] git2::Error),

    #[error("invocation timed out after {}s", elapsed.as_secs())]
    TimedOut { elapsed: Duration },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl BridgeError {
    pub fn malformed_spec(input: &str, reason: impl Into<String>) -> Self {
        Self::MalformedSpec {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub fn malformed_table(reason: impl Into<String>) -> Self {
        Self::MalformedSubmoduleTable {
            reason: reason.into(),
        }
    }

    pub fn partial_write(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::PartialWriteDetected {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit code for this error.
    ///
    /// - 2: bad specification or configuration
    /// - 3: remote or ref resolution
    /// - 4: local filesystem or output directory
    /// - 5: repository content (submodule table)
    /// - 6: timeout
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::MalformedSpec { .. } | Self::Config(_) => 2,
            Self::RefNotFound { .. }
            | Self::RemoteUnreachable { .. }
            | Self::LargeFileFetch { .. }
            | Self::GitCommand { .. }
            | Self::Git(_) => 3,
            Self::OutputDirectoryNotEmpty { .. }
            | Self::PartialWriteDetected { .. }
            | Self::Io { .. } => 4,
            Self::DuplicateSubmoduleName { .. } | Self::MalformedSubmoduleTable { .. } => 5,
            Self::TimedOut { .. } => 6,
        }
    }
}

/// Attach a lazily built message to an `io::Result`, like `anyhow::Context`.
pub trait IoContext<T> {
    fn io_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|source| BridgeError::io(f(), source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_distinguish_families() {
        let spec = BridgeError::malformed_spec("x?y", "bad query");
        let remote = BridgeError::RefNotFound {
            url: "/src/ring0".to_string(),
            reference: "nope".to_string(),
        };
        let output = BridgeError::OutputDirectoryNotEmpty {
            path: PathBuf::from("/tmp/out"),
        };

        assert_eq!(spec.exit_code(), 2);
        assert_eq!(remote.exit_code(), 3);
        assert_eq!(output.exit_code(), 4);
        assert_eq!(
            BridgeError::DuplicateSubmoduleName {
                name: "libeconf".to_string()
            }
            .exit_code(),
            5
        );
    }

    #[test]
    fn io_context_wraps_message() {
        let result: std::io::Result<()> = Err(std::io::Error::other("boom"));
        let err = result.io_context(|| "Failed to write ring0.info").unwrap_err();
        assert_eq!(err.to_string(), "Failed to write ring0.info: boom");
        assert_eq!(err.exit_code(), 4);
    }
}
