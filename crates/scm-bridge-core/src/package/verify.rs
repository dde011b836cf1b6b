//! Consistency check of an output directory holding package metadata.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{INFO_EXTENSION, XML_EXTENSION, unescape_xml};
use crate::error::{BridgeError, IoContext, Result};
use crate::fs::is_temp_name;
use crate::git::is_commit_hash;

#[derive(Default)]
struct PackageFiles {
    info: Option<PathBuf>,
    xml: Option<PathBuf>,
}

/// Check that `dir` holds only complete, consistent package metadata.
///
/// Returns the number of packages. Leftover temp files, an `.info` without
/// its `.xml` (or the reverse), unexpected entries, and an `.xml` whose
/// scmsync commit differs from the `.info` are all `PartialWriteDetected`.
pub fn verify_output(dir: &Path) -> Result<usize> {
    let partial = |reason: String| BridgeError::partial_write(dir, reason);
    let mut packages: BTreeMap<String, PackageFiles> = BTreeMap::new();

    for entry in
        fs::read_dir(dir).io_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let entry =
            entry.io_context(|| format!("Failed to read directory entry: {}", dir.display()))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if is_temp_name(&name) {
            return Err(partial(format!("leftover temporary file {name}")));
        }
        let ty = entry
            .file_type()
            .io_context(|| format!("Failed to stat {}", entry.path().display()))?;
        let Some((stem, extension)) = name.rsplit_once('.').filter(|_| ty.is_file()) else {
            return Err(partial(format!("unexpected entry {name}")));
        };

        let files = packages.entry(stem.to_string()).or_default();
        match extension {
            INFO_EXTENSION => files.info = Some(entry.path()),
            XML_EXTENSION => files.xml = Some(entry.path()),
            _ => return Err(partial(format!("unexpected entry {name}"))),
        }
    }

    for (name, files) in &packages {
        let (info, xml) = match (&files.info, &files.xml) {
            (Some(info), Some(xml)) => (info, xml),
            (Some(_), None) => return Err(partial(format!("{name}.info has no {name}.xml"))),
            (None, _) => return Err(partial(format!("{name}.xml has no {name}.info"))),
        };

        let info_text = read(info)?;
        let commit = info_text
            .strip_suffix('\n')
            .filter(|commit| is_commit_hash(commit))
            .ok_or_else(|| partial(format!("{name}.info does not hold a commit id")))?;

        let xml_text = read(xml)?;
        let (xml_name, scmsync) = parse_package_xml(&xml_text)
            .ok_or_else(|| partial(format!("{name}.xml is not a package descriptor")))?;
        if xml_name != *name {
            return Err(partial(format!(
                "{name}.xml describes package '{xml_name}'"
            )));
        }
        match scmsync.rsplit_once('#') {
            Some((_, pinned)) if pinned == commit => {}
            _ => {
                return Err(partial(format!(
                    "{name}.xml scmsync '{scmsync}' does not match commit {commit}"
                )));
            }
        }
    }

    Ok(packages.len())
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).io_context(|| format!("Failed to read {}", path.display()))
}

/// Extract the package name and scmsync value from a rendered descriptor.
fn parse_package_xml(text: &str) -> Option<(String, String)> {
    let body = text
        .strip_suffix('\n')?
        .strip_prefix("<package name=\"")?
        .strip_suffix("</scmsync></package>")?;
    let (name, scmsync) = body.split_once("\"><scmsync>")?;
    Some((unescape_xml(name)?, unescape_xml(scmsync)?))
}
