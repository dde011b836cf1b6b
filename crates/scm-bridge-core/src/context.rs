//! Invocation context threaded through every pipeline stage.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::{BridgeConfig, DEFAULT_WORKERS};
use crate::error::{BridgeError, Result};
use crate::git::GitCliBackend;

/// Settings for one bridge invocation.
///
/// Frontends build this once from config and flags and hand it to the
/// pipeline; nothing in the core reads process-wide state instead.
#[derive(Debug, Clone)]
pub struct BridgeContext {
    git_program: PathBuf,
    allow_file_protocol: bool,
    workers: usize,
    timeout: Option<Duration>,
}

impl BridgeContext {
    pub fn new() -> Self {
        Self {
            git_program: PathBuf::from("git"),
            allow_file_protocol: true,
            workers: DEFAULT_WORKERS,
            timeout: None,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            git_program: config.git.program.clone(),
            allow_file_protocol: config.git.allow_file_protocol,
            workers: config.emit.workers.max(1),
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn with_git_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.git_program = program.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_file_protocol(mut self, allow: bool) -> Self {
        self.allow_file_protocol = allow;
        self
    }

    pub fn git_program(&self) -> &Path {
        &self.git_program
    }

    pub fn allow_file_protocol(&self) -> bool {
        self.allow_file_protocol
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Start the clock for one invocation.
    pub fn deadline(&self) -> Deadline {
        Deadline::new(self.timeout)
    }

    /// Get the git CLI checkout backend.
    pub fn checkout_backend(&self) -> GitCliBackend {
        GitCliBackend::new(self.git_program.clone(), self.allow_file_protocol)
    }
}

impl Default for BridgeContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall-clock budget of a single invocation.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub fn new(limit: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fail with `TimedOut` once the budget is spent.
    pub fn check(&self) -> Result<()> {
        let elapsed = self.elapsed();
        match self.limit {
            Some(limit) if elapsed >= limit => Err(BridgeError::TimedOut { elapsed }),
            _ => Ok(()),
        }
    }
}
