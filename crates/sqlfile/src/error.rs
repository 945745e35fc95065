//! Error types for schema-definition file parsing.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while splitting a SQL file into statements.
#[derive(Debug, Error)]
pub enum Error {
    /// A quoted string or identifier was never closed
    #[error("{}:{line}: unterminated {quote} quote", .file.display())]
    UnterminatedQuote {
        /// File being parsed
        file: PathBuf,
        /// Line where the quote was opened (1-indexed)
        line: usize,
        /// The opening quote character
        quote: char,
    },

    /// A `/* ... */` comment was never closed
    #[error("{}:{line}: unterminated comment", .file.display())]
    UnterminatedComment {
        /// File being parsed
        file: PathBuf,
        /// Line where the comment was opened (1-indexed)
        line: usize,
    },

    /// `DELIMITER` command with no usable delimiter
    #[error("{}:{line}: DELIMITER command requires a delimiter", .file.display())]
    EmptyDelimiter {
        /// File being parsed
        file: PathBuf,
        /// Line of the DELIMITER command (1-indexed)
        line: usize,
    },

    /// IO error reading a file
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File that could not be read
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for sqlfile operations.
pub type Result<T> = std::result::Result<T, Error>;
