//! Source specification types.

use std::fmt;

use crate::error::{BridgeError, Result};

/// Large-file (git-lfs) retrieval policy, from the `lfs` query flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LfsMode {
    /// Whatever a plain checkout does in this environment
    #[default]
    Auto,
    /// `?lfs=1`: always fetch and materialize object content
    ForceOn,
    /// `?lfs=0`: leave pointer stubs in place
    ForceOff,
}

impl LfsMode {
    fn query_value(self) -> Option<&'static str> {
        match self {
            Self::Auto => None,
            Self::ForceOn => Some("1"),
            Self::ForceOff => Some("0"),
        }
    }
}

/// Specification for a git source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    /// Repository address, a remote URL or a local path
    pub base_url: String,
    /// Git reference (branch, tag, or commit SHA); `None` means the default branch
    pub reference: Option<String>,
    pub lfs_mode: LfsMode,
}

impl SourceSpec {
    /// Create a new SourceSpec with just a repository address.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            reference: None,
            lfs_mode: LfsMode::Auto,
        }
    }

    /// Set the git reference (branch, tag, or commit).
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_lfs_mode(mut self, lfs_mode: LfsMode) -> Self {
        self.lfs_mode = lfs_mode;
        self
    }

    /// Parse a source string into a SourceSpec.
    ///
    /// Supports formats:
    /// - `https://host/org/repo`
    /// - `https://host/org/repo#v1.0.0`
    /// - `https://host/org/repo?lfs=0#<sha>`
    /// - `/local/path/repo?lfs=1`
    ///
    /// The last `#` starts the ref and the last `?` before it starts the
    /// query, so both are always suffixes of the address.
    pub fn parse(source: &str) -> Result<Self> {
        let (rest, reference) = match source.rsplit_once('#') {
            Some((rest, fragment)) => (rest, Self::parse_fragment(source, fragment)?),
            None => (source, None),
        };

        let (base, lfs_mode) = match rest.rsplit_once('?') {
            Some((base, query)) => (base, Self::parse_query(source, query)?),
            None => (rest, LfsMode::Auto),
        };

        let base = base.trim();
        if base.is_empty() {
            return Err(BridgeError::malformed_spec(
                source,
                "missing repository address",
            ));
        }
        if base.starts_with('-') {
            return Err(BridgeError::malformed_spec(
                source,
                "repository address must not start with '-'",
            ));
        }

        Ok(Self {
            base_url: base.to_string(),
            reference,
            lfs_mode,
        })
    }

    fn parse_fragment(source: &str, fragment: &str) -> Result<Option<String>> {
        if fragment.is_empty() {
            return Ok(None);
        }
        if fragment.contains('?') {
            return Err(BridgeError::malformed_spec(
                source,
                "the query must precede the '#' ref fragment",
            ));
        }
        if fragment.starts_with('-') {
            return Err(BridgeError::malformed_spec(
                source,
                "ref must not start with '-'",
            ));
        }
        if fragment
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(BridgeError::malformed_spec(
                source,
                "ref contains whitespace or control characters",
            ));
        }
        Ok(Some(fragment.to_string()))
    }

    /// The only recognized flag is `lfs` with values `0` or `1`.
    fn parse_query(source: &str, query: &str) -> Result<LfsMode> {
        if query.is_empty() {
            return Err(BridgeError::malformed_spec(source, "empty query"));
        }

        let mut mode = None;
        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            if key != "lfs" {
                return Err(BridgeError::malformed_spec(
                    source,
                    format!("unsupported query parameter '{key}'"),
                ));
            }
            if mode.is_some() {
                return Err(BridgeError::malformed_spec(
                    source,
                    "query parameter 'lfs' given more than once",
                ));
            }
            mode = Some(match value {
                "0" => LfsMode::ForceOff,
                "1" => LfsMode::ForceOn,
                other => {
                    return Err(BridgeError::malformed_spec(
                        source,
                        format!("lfs must be 0 or 1, got '{other}'"),
                    ));
                }
            });
        }

        Ok(mode.unwrap_or_default())
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url)?;
        if let Some(value) = self.lfs_mode.query_value() {
            write!(f, "?lfs={value}")?;
        }
        if let Some(reference) = &self.reference {
            write!(f, "#{reference}")?;
        }
        Ok(())
    }
}
