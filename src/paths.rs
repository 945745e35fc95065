//! Path expansion for option values
//!
//! Options that name files (such as `socket`) may use `~` and environment
//! variables; they go through [`expand`] before use.

use std::path::PathBuf;

/// Expand ~ and environment variables in a path string.
///
/// This is the canonical path expansion function for schemer. All modules
/// should use this instead of calling shellexpand directly. Unknown
/// variables are left as-is.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// The user's home directory, cleaned lexically
pub fn home_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| crate::fs::clean_path(&home))
}
