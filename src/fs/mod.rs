//! Configuration/schema tree - one [`Dir`] per directory

pub mod ancestry;
pub mod dir;
pub mod logical;

pub use ancestry::{ancestor_paths, clean_path, find_repo_base};
pub use dir::Dir;
pub use logical::{Duplicate, LogicalSchema};

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors building the tree
#[derive(Debug, Error)]
pub enum Error {
    #[error("path {} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("path {} is not a directory", .0.display())]
    NotDir(PathBuf),

    #[error(transparent)]
    Config(#[from] crate::config::Error),

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot list directory: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A problem local to one directory. Recorded on the [`Dir`] instead of
/// aborting the walk.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0}")]
    Duplicate(Duplicate),

    #[error("{}: {reason}", .path.display())]
    Symlink { path: PathBuf, reason: String },

    #[error(transparent)]
    Sql(#[from] sqlfile::Error),

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
