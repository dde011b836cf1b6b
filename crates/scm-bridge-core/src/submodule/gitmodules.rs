//! Parser for the `.gitmodules` table.
//!
//! Understands the subset of git's config syntax that appears in submodule
//! tables: `[submodule "name"]` headers (and the legacy `[submodule.name]`
//! form), `key = value` lines with optional quoting, and `#`/`;` comments.
//! Sections other than `submodule` are skipped.

use crate::error::{BridgeError, Result};

/// One `[submodule "name"]` section as declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleDecl {
    pub name: String,
    pub path: String,
    /// URL as written, possibly relative
    pub url: String,
}

#[derive(Default)]
struct Section {
    name: String,
    line: usize,
    path: Option<String>,
    url: Option<String>,
}

impl Section {
    fn finish(self) -> Result<SubmoduleDecl> {
        let missing = |key: &str| {
            BridgeError::malformed_table(format!(
                "submodule '{}' (line {}) has no {key}",
                self.name, self.line
            ))
        };
        let path = match &self.path {
            Some(path) if !path.is_empty() => path.trim_end_matches('/').to_string(),
            _ => return Err(missing("path")),
        };
        let url = match &self.url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => return Err(missing("url")),
        };
        Ok(SubmoduleDecl {
            name: self.name,
            path,
            url,
        })
    }
}

/// Parse a `.gitmodules` table, keeping declaration order.
pub fn parse_gitmodules(text: &str) -> Result<Vec<SubmoduleDecl>> {
    let mut decls: Vec<SubmoduleDecl> = Vec::new();
    let mut current: Option<Section> = None;
    // true while inside a section that is not a submodule section
    let mut skipping = false;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            if let Some(section) = current.take() {
                decls.push(section.finish()?);
            }
            match parse_header(line, line_no)? {
                Some(name) => {
                    if decls.iter().any(|d| d.name == name) {
                        return Err(BridgeError::DuplicateSubmoduleName { name });
                    }
                    skipping = false;
                    current = Some(Section {
                        name,
                        line: line_no,
                        ..Section::default()
                    });
                }
                None => skipping = true,
            }
            continue;
        }

        if skipping {
            continue;
        }
        let Some(section) = current.as_mut() else {
            return Err(BridgeError::malformed_table(format!(
                "line {line_no}: entry outside of any section"
            )));
        };

        let (key, value) = match line.split_once('=') {
            Some((key, value)) => (key.trim(), Some(parse_value(value, line_no)?)),
            None => (strip_comment(line).trim(), None),
        };
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(BridgeError::malformed_table(format!(
                "line {line_no}: invalid key '{key}'"
            )));
        }

        // last value wins, as in git
        match key.to_ascii_lowercase().as_str() {
            "path" => section.path = value,
            "url" => section.url = value,
            _ => {}
        }
    }

    if let Some(section) = current.take() {
        decls.push(section.finish()?);
    }
    Ok(decls)
}

/// Returns the submodule name for a submodule header, `None` for other sections.
fn parse_header(line: &str, line_no: usize) -> Result<Option<String>> {
    let malformed =
        |reason: &str| BridgeError::malformed_table(format!("line {line_no}: {reason}"));

    let close = line.rfind(']').ok_or_else(|| malformed("unterminated section header"))?;
    let rest = strip_comment(&line[close + 1..]).trim();
    if !rest.is_empty() {
        return Err(malformed("trailing content after section header"));
    }
    let inner = line[1..close].trim();

    if let Some(quote) = inner.find('"') {
        let section = inner[..quote].trim();
        if !section.eq_ignore_ascii_case("submodule") {
            return Ok(None);
        }
        let name = parse_subsection(&inner[quote + 1..]).ok_or_else(|| {
            malformed("unterminated quoted section name")
        })?;
        if name.is_empty() {
            return Err(malformed("empty submodule name"));
        }
        return Ok(Some(name));
    }

    match inner.split_once('.') {
        Some((section, name)) if section.eq_ignore_ascii_case("submodule") => {
            if name.is_empty() {
                return Err(malformed("empty submodule name"));
            }
            Ok(Some(name.to_string()))
        }
        _ if inner.eq_ignore_ascii_case("submodule") => {
            Err(malformed("submodule section without a name"))
        }
        _ => Ok(None),
    }
}

/// Body of a quoted subsection after the opening quote, up to the closing one.
fn parse_subsection(body: &str) -> Option<String> {
    let mut name = String::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return chars.as_str().trim().is_empty().then_some(name),
            '\\' => name.push(chars.next()?),
            _ => name.push(c),
        }
    }
    None
}

fn parse_value(raw: &str, line_no: usize) -> Result<String> {
    let mut value = String::new();
    let mut in_quotes = false;
    let mut chars = raw.trim().chars();
    // whitespace is held back so trailing blanks before a comment are dropped
    let mut pending_space = String::new();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                value.push_str(&pending_space);
                pending_space.clear();
                in_quotes = !in_quotes;
            }
            '\\' => {
                let escaped = match chars.next() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('b') => '\u{8}',
                    Some(c @ ('"' | '\\')) => c,
                    _ => {
                        return Err(BridgeError::malformed_table(format!(
                            "line {line_no}: invalid escape in value"
                        )));
                    }
                };
                value.push_str(&pending_space);
                pending_space.clear();
                value.push(escaped);
            }
            '#' | ';' if !in_quotes => break,
            c if c.is_whitespace() && !in_quotes => pending_space.push(c),
            c => {
                value.push_str(&pending_space);
                pending_space.clear();
                value.push(c);
            }
        }
    }

    if in_quotes {
        return Err(BridgeError::malformed_table(format!(
            "line {line_no}: unterminated quoted value"
        )));
    }
    Ok(value)
}

fn strip_comment(text: &str) -> &str {
    match text.find(['#', ';']) {
        Some(pos) => &text[..pos],
        None => text,
    }
}
