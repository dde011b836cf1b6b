//! Repository address helpers
//!
//! This module handles:
//! - Telling remote URLs, scp-style addresses and local paths apart
//! - Resolving relative submodule URLs the way git does
//! - Deriving a package name from a repository address

use url::Url;

use crate::error::{BridgeError, Result};

/// Check for scp-style addresses like `git@host:org/repo`.
///
/// The colon must come before any slash, otherwise `/a:b` would qualify.
pub fn is_scp_like(address: &str) -> bool {
    if address.contains("://") {
        return false;
    }
    match (address.find(':'), address.find('/')) {
        (Some(colon), Some(slash)) => colon > 0 && colon < slash,
        (Some(colon), None) => colon > 0,
        _ => false,
    }
}

/// Check whether an address names a repository on the local filesystem.
pub fn is_local_path(address: &str) -> bool {
    address.starts_with("file://") || (!address.contains("://") && !is_scp_like(address))
}

/// Check if a submodule URL is relative to its superproject's URL.
pub fn is_relative_url(url: &str) -> bool {
    url.starts_with("./") || url.starts_with("../") || url == "." || url == ".."
}

/// Resolve a submodule URL declared in `.gitmodules` against the
/// superproject's address.
///
/// Absolute URLs are returned unchanged. For relative ones each leading `../`
/// drops one trailing component of `base`, `./` drops none, and the remainder
/// is appended: `../libeconf` against `/src/rpms/ring0` is `/src/rpms/libeconf`.
pub fn resolve_submodule_url(base: &str, url: &str) -> Result<String> {
    if !is_relative_url(url) {
        return Ok(url.to_string());
    }

    let mut rest = url;
    let mut up = 0usize;
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("../") {
            up += 1;
            rest = stripped;
        } else if rest == ".." {
            up += 1;
            rest = "";
        } else if rest == "." {
            rest = "";
        } else {
            break;
        }
    }
    let tail: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    let escapes = || {
        BridgeError::malformed_table(format!(
            "relative submodule url '{url}' escapes the superproject address '{base}'"
        ))
    };

    if let Ok(mut parsed) = Url::parse(base)
        && !parsed.cannot_be_a_base()
    {
        let mut segments: Vec<String> = parsed
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        for _ in 0..up {
            segments.pop().ok_or_else(escapes)?;
        }
        segments.extend(tail.iter().map(|s| s.to_string()));
        parsed.set_path(&format!("/{}", segments.join("/")));
        parsed.set_query(None);
        parsed.set_fragment(None);
        return Ok(parsed.to_string());
    }

    let (prefix, path) = match base.split_once(':') {
        Some((host, path)) if is_scp_like(base) => (format!("{host}:"), path),
        _ => (String::new(), base),
    };
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    for _ in 0..up {
        let last = segments.last().copied();
        match last {
            Some("..") | None if !absolute && prefix.is_empty() => segments.push(".."),
            Some(_) => {
                segments.pop();
            }
            None => return Err(escapes()),
        }
    }
    segments.extend(tail);

    let joined = segments.join("/");
    Ok(if absolute {
        format!("{prefix}/{joined}")
    } else {
        format!("{prefix}{joined}")
    })
}

/// Package name for a repository address: its last path component without a
/// trailing `.git`.
pub fn repository_name(address: &str) -> Option<String> {
    let trimmed = address.trim_end_matches('/');
    let path = if trimmed.contains("://") {
        // only the path names the repository, never the host
        let parsed = Url::parse(address).ok()?;
        parsed.path().trim_end_matches('/').to_string()
    } else if is_scp_like(trimmed) {
        trimmed
            .split_once(':')
            .map_or(trimmed, |(_, path)| path)
            .to_string()
    } else {
        trimmed.to_string()
    };
    let last = path.rsplit('/').next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() || name == "." || name == ".." || name.contains(':') {
        None
    } else {
        Some(name.to_string())
    }
}
