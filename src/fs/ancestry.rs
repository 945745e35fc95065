//! Lexical path helpers and repository base detection

use std::path::{Component, Path, PathBuf};

/// Marker directories that identify the top of a working copy
pub const REPO_MARKERS: &[&str] = &[".git", ".hg", ".svn"];

/// Clean a path lexically: drop `.` and repeated separators, resolve `..`
/// against the preceding component. Never touches the filesystem.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

/// The cleaned path followed by each of its parents, ending at the root.
pub fn ancestor_paths(path: &Path) -> Vec<PathBuf> {
    let cleaned = clean_path(path);
    cleaned.ancestors().map(Path::to_path_buf).collect()
}

/// Find the repository base for `path`.
///
/// Walks upward until a directory containing a version-control marker is
/// found. The walk never goes above `home`, which is its own base. Without a
/// marker or home on the way up, the filesystem root is the base.
pub fn find_repo_base(path: &Path, home: Option<&Path>) -> PathBuf {
    let cleaned = clean_path(path);
    let mut base = cleaned.as_path();
    for ancestor in cleaned.ancestors() {
        base = ancestor;
        if home == Some(ancestor) || is_repo_root(ancestor) {
            break;
        }
    }
    base.to_path_buf()
}

fn is_repo_root(dir: &Path) -> bool {
    REPO_MARKERS.iter().any(|marker| dir.join(marker).is_dir())
}
