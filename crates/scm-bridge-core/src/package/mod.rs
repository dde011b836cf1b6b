//! Build-service package metadata.
//!
//! Every package gets a `<name>.info` holding the pinned commit and a
//! `<name>.xml` pointing the build service at `url#commit`.

mod emit;
mod verify;

use crate::error::{BridgeError, Result};
use crate::git::repository_name;
use crate::submodule::SubmoduleRef;

pub use emit::PackageEmitter;
pub use verify::verify_output;

pub const INFO_EXTENSION: &str = "info";
pub const XML_EXTENSION: &str = "xml";

/// One package to be described in the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    pub name: String,
    pub url: String,
    pub head_commit: String,
}

impl PackageDescriptor {
    /// Descriptor for the repository at `base_url` itself.
    pub fn root(base_url: &str, head_commit: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: root_package_name(base_url)?,
            url: base_url.to_string(),
            head_commit: head_commit.into(),
        })
    }

    pub fn from_submodule(submodule: &SubmoduleRef) -> Result<Self> {
        check_package_name(&submodule.name).map_err(|reason| {
            BridgeError::malformed_table(format!(
                "submodule name '{}' cannot be a package name: {reason}",
                submodule.name
            ))
        })?;
        Ok(Self {
            name: submodule.name.clone(),
            url: submodule.url.clone(),
            head_commit: submodule.head_commit.clone(),
        })
    }

    /// `url#commit`, the value of the `<scmsync>` element.
    pub fn scmsync_url(&self) -> String {
        format!("{}#{}", self.url, self.head_commit)
    }

    pub fn info_file_name(&self) -> String {
        format!("{}.{INFO_EXTENSION}", self.name)
    }

    pub fn xml_file_name(&self) -> String {
        format!("{}.{XML_EXTENSION}", self.name)
    }

    pub fn render_info(&self) -> String {
        format!("{}\n", self.head_commit)
    }

    pub fn render_xml(&self) -> String {
        format!(
            "<package name=\"{}\"><scmsync>{}</scmsync></package>\n",
            escape_xml(&self.name),
            escape_xml(&self.scmsync_url())
        )
    }
}

/// Package name of the repository at `base_url`: its last path segment.
pub fn root_package_name(base_url: &str) -> Result<String> {
    let name = repository_name(base_url).ok_or_else(|| {
        BridgeError::malformed_spec(base_url, "cannot derive a package name from the address")
    })?;
    check_package_name(&name).map_err(|reason| {
        BridgeError::malformed_spec(base_url, format!("package name '{name}' {reason}"))
    })?;
    Ok(name)
}

/// Descriptors for the root package followed by each submodule, in order.
///
/// Package names share one directory, so they must be unique across the root
/// and all submodules.
pub fn project_descriptors(
    root: PackageDescriptor,
    submodules: &[SubmoduleRef],
) -> Result<Vec<PackageDescriptor>> {
    let mut packages = Vec::with_capacity(submodules.len() + 1);
    packages.push(root);
    for submodule in submodules {
        let package = PackageDescriptor::from_submodule(submodule)?;
        if packages.iter().any(|p| p.name == package.name) {
            return Err(BridgeError::DuplicateSubmoduleName { name: package.name });
        }
        packages.push(package);
    }
    Ok(packages)
}

fn check_package_name(name: &str) -> std::result::Result<(), &'static str> {
    if name.is_empty() {
        return Err("is empty");
    }
    if name.starts_with('.') {
        return Err("must not start with '.'");
    }
    if name.contains(['/', '\\']) {
        return Err("must be a single path component");
    }
    if name.chars().any(char::is_control) {
        return Err("must not contain control characters");
    }
    Ok(())
}

pub(crate) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

pub(crate) fn unescape_xml(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let end = rest[pos..].find(';')? + pos;
        let entity = match &rest[pos + 1..end] {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => return None,
        };
        out.push(entity);
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}
