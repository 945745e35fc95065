//! # sqlfile
//!
//! Pure Rust splitter for schema-definition SQL files.
//!
//! This crate provides functionality for:
//! - Splitting `*.sql` files into statements (quotes, comments, `DELIMITER`)
//! - Classifying statements as CREATE, client command, no-op or unknown
//! - Extracting the [`ObjectKey`] and optional schema qualifier of a CREATE
//! - Recognizing `USE` commands that switch the default schema
//!
//! It deliberately does not understand SQL beyond that: column definitions,
//! indexes and program bodies are opaque text.
//!
//! ## Example
//!
//! ```
//! use sqlfile::{parse_string, ObjectKey, StatementType};
//! use std::path::Path;
//!
//! let sql = "USE shop;\nCREATE TABLE orders (id int);\n";
//! let stmts = parse_string(sql, Path::new("orders.sql")).unwrap();
//!
//! assert!(stmts[0].is_schema_switch());
//! assert_eq!(stmts[1].kind, StatementType::Create);
//! assert_eq!(stmts[1].object, Some(ObjectKey::table("orders")));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod parser;
pub mod types;

pub use error::{Error, Result};
pub use parser::{parse_file, parse_string};
pub use types::{ObjectKey, ObjectType, Statement, StatementType};
