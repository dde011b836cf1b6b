//! Invocation of the git executable.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::debug;

use crate::context::Deadline;
use crate::error::{BridgeError, IoContext, Result};

/// Variables that would redirect git away from the repository we point it at.
const GIT_ENV_OVERRIDES: [&str; 4] = [
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_COMMON_DIR",
];

/// Runs git with a fixed program, `-c` overrides and environment.
#[derive(Debug, Clone)]
pub struct GitRunner {
    program: PathBuf,
    config: Vec<String>,
    envs: Vec<(String, String)>,
    deadline: Deadline,
}

impl GitRunner {
    pub fn new(program: impl Into<PathBuf>, deadline: Deadline) -> Self {
        Self {
            program: program.into(),
            config: Vec::new(),
            envs: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
            deadline,
        }
    }

    /// Add a `-c key=value` override to every invocation.
    pub fn with_config(mut self, entry: impl Into<String>) -> Self {
        self.config.push(entry.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Drop a previously added environment variable.
    pub fn without_env(mut self, key: &str) -> Self {
        self.envs.retain(|(k, _)| k != key);
        self
    }

    fn command(&self, cwd: Option<&Path>, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        for key in GIT_ENV_OVERRIDES {
            cmd.env_remove(key);
        }
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        for entry in &self.config {
            cmd.arg("-c").arg(entry);
        }
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run git and return its raw output, whatever the exit status.
    pub fn output(&self, cwd: Option<&Path>, args: &[&str]) -> Result<Output> {
        debug!(args = ?args, cwd = ?cwd, "running git");
        let output = self
            .command(cwd, args)
            .output()
            .io_context(|| format!("Failed to invoke {}", self.program.display()))?;
        self.deadline.check()?;
        Ok(output)
    }

    /// Run a git command that must succeed; returns trimmed stdout.
    pub fn run(&self, cwd: Option<&Path>, args: &[&str]) -> Result<String> {
        let stdout = self.run_raw(cwd, args)?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }

    /// Like [`run`](Self::run) but returns stdout untouched, for `-z` output.
    pub fn run_raw(&self, cwd: Option<&Path>, args: &[&str]) -> Result<Vec<u8>> {
        let output = self.output(cwd, args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BridgeError::GitCommand {
                args: args.join(" "),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// Resolve a revision to a commit id; `None` if it does not name a commit.
    pub fn rev_parse_commit(&self, cwd: &Path, rev: &str) -> Result<Option<String>> {
        let spec = format!("{rev}^{{commit}}");
        let output = self.output(
            Some(cwd),
            &["rev-parse", "--verify", "--quiet", &spec],
        )?;
        if !output.status.success() {
            return Ok(None);
        }
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!sha.is_empty()).then_some(sha))
    }

    /// Path argument for git, which only accepts valid UTF-8 here.
    pub fn path_arg(path: &Path) -> Result<&str> {
        path.to_str().ok_or_else(|| {
            BridgeError::io(
                format!("Path is not valid UTF-8: {}", path.display()),
                std::io::Error::from(std::io::ErrorKind::InvalidInput),
            )
        })
    }
}

/// Check for a full 40-character lowercase hex commit id.
pub fn is_commit_hash(value: &str) -> bool {
    value.len() == 40
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}
