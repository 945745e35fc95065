//! Core types for parsed schema-definition statements.

use std::fmt;
use std::path::PathBuf;

/// Kind of database object a CREATE statement defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectType {
    /// CREATE TABLE
    Table,
    /// CREATE VIEW
    View,
    /// CREATE PROCEDURE
    Procedure,
    /// CREATE FUNCTION
    Function,
    /// CREATE TRIGGER
    Trigger,
    /// CREATE EVENT
    Event,
}

impl ObjectType {
    /// Keyword used in DDL for this object type.
    pub fn keyword(&self) -> &'static str {
        match self {
            ObjectType::Table => "table",
            ObjectType::View => "view",
            ObjectType::Procedure => "procedure",
            ObjectType::Function => "function",
            ObjectType::Trigger => "trigger",
            ObjectType::Event => "event",
        }
    }

    /// Parse an object type from its DDL keyword (case-insensitive).
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(ObjectType::Table),
            "view" => Some(ObjectType::View),
            "procedure" => Some(ObjectType::Procedure),
            "function" => Some(ObjectType::Function),
            "trigger" => Some(ObjectType::Trigger),
            "event" => Some(ObjectType::Event),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// Identifies one schema object: its type plus its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Object type
    pub object_type: ObjectType,
    /// Unqualified object name
    pub name: String,
}

impl ObjectKey {
    /// Create a new object key.
    pub fn new(object_type: ObjectType, name: impl Into<String>) -> Self {
        Self {
            object_type,
            name: name.into(),
        }
    }

    /// Shorthand for a table key.
    pub fn table(name: impl Into<String>) -> Self {
        Self::new(ObjectType::Table, name)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`", self.object_type, self.name)
    }
}

/// Classification of a parsed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementType {
    /// Only whitespace and/or comments
    Noop,
    /// A CREATE for a supported object type
    Create,
    /// A client command such as `USE` or `DELIMITER`
    Command,
    /// Anything else (INSERT, SET, CREATE DATABASE, ...)
    Unknown,
}

/// One statement from a schema-definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// File the statement was read from
    pub file: PathBuf,
    /// Line of the first significant character (1-indexed)
    pub line: usize,
    /// Full text, including leading comments and the trailing delimiter
    pub text: String,
    /// Statement classification
    pub kind: StatementType,
    /// Object defined by a CREATE
    pub object: Option<ObjectKey>,
    /// Schema qualifier of a CREATE, or the target of a `USE`
    pub schema: Option<String>,
    /// Delimiter in effect when the statement was read
    pub delimiter: String,
}

impl Statement {
    /// Location string for diagnostics, e.g. `users.sql:12`.
    pub fn location(&self) -> String {
        format!("{}:{}", self.file.display(), self.line)
    }

    /// Whether this is a `USE` command switching the default schema.
    pub fn is_schema_switch(&self) -> bool {
        self.kind == StatementType::Command && self.schema.is_some()
    }

    /// Statement body without leading comments/whitespace or the delimiter.
    pub fn body(&self) -> &str {
        let trimmed = crate::parser::strip_leading_noise(&self.text);
        let trimmed = trimmed.trim_end();
        trimmed
            .strip_suffix(self.delimiter.as_str())
            .unwrap_or(trimmed)
            .trim_end()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.body())
    }
}
