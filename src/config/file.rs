//! Per-directory option files (`.schemer`)
//!
//! INI-like format:
//!
//! ```text
//! # comment
//! host=db.example.com
//! schema = shop
//! skip-verify
//!
//! [staging]
//! host='staging-1, staging-2'
//! ```
//!
//! Sectionless lines at the top always apply; a `[section]` applies only when
//! it matches the active environment.

use super::options::OptionRegistry;
use super::{Error, Result};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the option file looked up in every directory
pub const FILE_NAME: &str = ".schemer";

/// One `key[=value]` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: Option<String>,
    pub line: usize,
}

/// A parsed option file. Section `""` holds the sectionless lines.
#[derive(Debug, Clone)]
pub struct OptionFile {
    pub path: PathBuf,
    sections: IndexMap<String, Vec<Entry>>,
}

impl OptionFile {
    /// Read and parse an option file
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_str(&content, path)
    }

    /// Parse option file content; `path` is used for error messages
    pub fn parse_str(content: &str, path: &Path) -> Result<Self> {
        let mut sections: IndexMap<String, Vec<Entry>> = IndexMap::new();
        sections.insert(String::new(), Vec::new());
        let mut current = String::new();

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let malformed = |reason: &str| Error::Malformed {
                path: path.to_path_buf(),
                line: line_no,
                reason: reason.to_string(),
            };

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .ok_or_else(|| malformed("unterminated section header"))?
                    .trim();
                if name.is_empty() {
                    return Err(malformed("empty section name"));
                }
                current = name.to_string();
                sections.entry(current.clone()).or_default();
                continue;
            }

            let (key, value) = match line.split_once('=') {
                Some((k, v)) => (k.trim(), Some(unquote(v.trim()))),
                None => (line, None),
            };
            if key.is_empty() {
                return Err(malformed("missing option name"));
            }
            if !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(malformed("invalid option name"));
            }

            sections.entry(current.clone()).or_default().push(Entry {
                key: key.to_ascii_lowercase().replace('_', "-"),
                value,
                line: line_no,
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            sections,
        })
    }

    /// Entries of a section, empty if the section is absent
    pub fn entries(&self, section: &str) -> &[Entry] {
        self.sections.get(section).map_or(&[], Vec::as_slice)
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// Whether the file sets `name` at top level or in `environment`'s section
    pub fn sets_option(&self, name: &str, environment: &str) -> bool {
        [String::new(), environment.to_string()]
            .iter()
            .flat_map(|section| self.entries(section))
            .any(|entry| entry.key.strip_prefix("loose-").unwrap_or(&entry.key) == name)
    }
}

/// Strip one pair of quotes wrapping the whole value
fn unquote(value: &str) -> String {
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
            && !inner.contains(quote)
        {
            return inner.to_string();
        }
    }
    value.to_string()
}

/// Map a file entry onto a registered option.
///
/// Returns `None` for a `loose-` entry naming an unknown option.
pub(crate) fn resolve_entry(
    registry: &OptionRegistry,
    entry: &Entry,
    path: &Path,
) -> Result<Option<(&'static str, String)>> {
    let (key, loose) = match entry.key.strip_prefix("loose-") {
        Some(rest) => (rest, true),
        None => (entry.key.as_str(), false),
    };

    if let Some(spec) = registry.get(key) {
        let value = match (&entry.value, spec.is_bool()) {
            (None, true) => "true".to_string(),
            (None, false) => String::new(),
            (Some(v), _) => v.clone(),
        };
        return Ok(Some((spec.name, value)));
    }

    if let Some(spec) = key.strip_prefix("skip-").and_then(|name| registry.get(name))
        && spec.is_bool()
    {
        let value = match &entry.value {
            None => false,
            Some(v) => !super::parse_bool(spec.name, v)?,
        };
        return Ok(Some((spec.name, value.to_string())));
    }

    if loose {
        log::debug!(
            "{}:{}: ignoring unknown loose option {}",
            path.display(),
            entry.line,
            key
        );
        return Ok(None);
    }

    Err(Error::UnknownOption {
        name: key.to_string(),
        origin: format!("{}:{}", path.display(), entry.line),
    })
}
