//! Optional TOML configuration for the bridge.
//!
//! Looked up at `--config <file>` or `<config_dir>/scm-bridge/config.toml`.
//! Every key has a default, so a missing file means "all defaults".

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

pub const DEFAULT_WORKERS: usize = 4;

/// Root configuration structure for config.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Upper bound for a whole invocation, in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub git: GitSection,

    #[serde(default)]
    pub emit: EmitSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitSection {
    /// git executable to invoke
    #[serde(default = "default_git_program")]
    pub program: PathBuf,

    /// Allow `file://` transport for submodules of local repositories
    #[serde(default = "default_true")]
    pub allow_file_protocol: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmitSection {
    /// Worker threads used to write package metadata
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_git_program() -> PathBuf {
    PathBuf::from("git")
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            git: GitSection::default(),
            emit: EmitSection::default(),
        }
    }
}

impl Default for GitSection {
    fn default() -> Self {
        Self {
            program: default_git_program(),
            allow_file_protocol: true,
        }
    }
}

impl Default for EmitSection {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

impl BridgeConfig {
    /// Default config file location, if a config directory exists on this platform.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("scm-bridge").join("config.toml"))
    }

    /// Load the file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse_str(&content).map_err(|err| match err {
            BridgeError::Config(msg) => BridgeError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Load the explicit path if given, else the default location when it exists.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn parse_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| BridgeError::Config(e.message().trim().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.emit.workers == 0 {
            return Err(BridgeError::Config(
                "emit.workers must be at least 1".to_string(),
            ));
        }
        if self.timeout_secs == Some(0) {
            return Err(BridgeError::Config(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.git.program.as_os_str().is_empty() {
            return Err(BridgeError::Config("git.program is empty".to_string()));
        }
        Ok(())
    }
}
