//! What an invocation produces in the output directory.

use std::fmt;

/// Output mode, chosen once per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// The checked-out tree itself
    #[default]
    Flat,
    /// `.info`/`.xml` metadata for the root and each first-level submodule
    Project,
}

impl OutputMode {
    pub fn from_project_flag(project: bool) -> Self {
        if project { Self::Project } else { Self::Flat }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => write!(f, "flat"),
            Self::Project => write!(f, "project"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_flag_selects_mode() {
        assert_eq!(OutputMode::from_project_flag(false), OutputMode::Flat);
        assert_eq!(OutputMode::from_project_flag(true), OutputMode::Project);
        assert_eq!(OutputMode::default(), OutputMode::Flat);
        assert_eq!(OutputMode::Project.to_string(), "project");
    }
}
