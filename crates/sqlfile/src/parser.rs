//! Statement splitter for schema-definition SQL files.
//!
//! Splits MySQL-flavoured SQL into statements, honouring:
//! ```text
//! -- line comments, # line comments, /* block comments */
//! 'strings', "strings" and `identifiers` (with \ escapes and doubled quotes)
//! DELIMITER commands (for stored program bodies)
//! ```
//! Each statement is then classified as a CREATE (with its object key and
//! optional schema qualifier), a client command (`USE`, `DELIMITER`), a no-op,
//! or something unknown.

use crate::error::{Error, Result};
use crate::types::{ObjectKey, ObjectType, Statement, StatementType};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const IDENT: &str = r"(?:`(?:[^`]|``)+`|[\w$]+)";
const USER: &str = r#"(?:CURRENT_USER(?:\s*\(\s*\))?|(?:`[^`]*`|'[^']*'|"[^"]*"|[\w.%-]+)(?:\s*@\s*(?:`[^`]*`|'[^']*'|"[^"]*"|[\w.%-]+))?)"#;

static CREATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"(?is)^CREATE\s+(?:OR\s+REPLACE\s+)?(?:ALGORITHM\s*=\s*\w+\s+)?(?:DEFINER\s*=\s*{USER}\s+)?(?:SQL\s+SECURITY\s+\w+\s+)?(?:AGGREGATE\s+)?(TABLE|VIEW|PROCEDURE|FUNCTION|TRIGGER|EVENT)\s+(?:IF\s+NOT\s+EXISTS\s+)?({IDENT})(?:\s*\.\s*({IDENT}))?"
    );
    Regex::new(&pattern).expect("CREATE pattern is valid")
});

static USE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?is)^USE\s+({IDENT})$")).expect("USE pattern is valid")
});

/// Parse a schema-definition file from disk.
pub fn parse_file(path: &Path) -> Result<Vec<Statement>> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_string(&content, path)
}

/// Parse SQL text; `file` is only used for diagnostics.
pub fn parse_string(content: &str, file: &Path) -> Result<Vec<Statement>> {
    let mut scanner = Scanner::new(content, file);
    scanner.run()?;
    Ok(scanner.statements)
}

/// Strip leading whitespace and comments from statement text.
pub fn strip_leading_noise(text: &str) -> &str {
    let mut rest = text;
    loop {
        rest = rest.trim_start();
        if is_line_comment(rest) {
            rest = match rest.find('\n') {
                Some(eol) => &rest[eol + 1..],
                None => "",
            };
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = match after.find("*/") {
                Some(end) => &after[end + 2..],
                None => "",
            };
        } else {
            return rest;
        }
    }
}

fn is_line_comment(s: &str) -> bool {
    if s.starts_with('#') {
        return true;
    }
    match s.strip_prefix("--") {
        Some(after) => after.chars().next().is_none_or(char::is_whitespace),
        None => false,
    }
}

fn unquote_ident(ident: &str) -> String {
    match ident
        .strip_prefix('`')
        .and_then(|inner| inner.strip_suffix('`'))
    {
        Some(inner) => inner.replace("``", "`"),
        None => ident.to_string(),
    }
}

/// Classify statement text into (kind, object, schema).
fn classify(text: &str, delimiter: &str) -> (StatementType, Option<ObjectKey>, Option<String>) {
    let body = strip_leading_noise(text).trim_end();
    let body = body.strip_suffix(delimiter).unwrap_or(body).trim_end();

    if let Some(caps) = CREATE_RE.captures(body) {
        let Some(object_type) = caps.get(1).and_then(|m| ObjectType::from_keyword(m.as_str()))
        else {
            return (StatementType::Unknown, None, None);
        };
        let first = caps.get(2).map(|m| unquote_ident(m.as_str()));
        let second = caps.get(3).map(|m| unquote_ident(m.as_str()));
        let (schema, name) = match (first, second) {
            (Some(schema), Some(name)) => (Some(schema), name),
            (Some(name), None) => (None, name),
            _ => return (StatementType::Unknown, None, None),
        };
        return (
            StatementType::Create,
            Some(ObjectKey::new(object_type, name)),
            schema,
        );
    }

    if let Some(caps) = USE_RE.captures(body) {
        let schema = caps.get(1).map(|m| unquote_ident(m.as_str()));
        return (StatementType::Command, None, schema);
    }

    (StatementType::Unknown, None, None)
}

struct Scanner<'a> {
    src: &'a str,
    file: PathBuf,
    pos: usize,
    line: usize,
    start: usize,
    start_line: usize,
    has_content: bool,
    delimiter: String,
    statements: Vec<Statement>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str, file: &Path) -> Self {
        Self {
            src,
            file: file.to_path_buf(),
            pos: 0,
            line: 1,
            start: 0,
            start_line: 1,
            has_content: false,
            delimiter: ";".to_string(),
            statements: Vec::new(),
        }
    }

    fn run(&mut self) -> Result<()> {
        while self.pos < self.src.len() {
            let rest = &self.src[self.pos..];

            if !self.has_content && is_delimiter_command(rest) {
                self.delimiter_command()?;
                continue;
            }
            if is_line_comment(rest) {
                self.skip_line_comment();
                continue;
            }
            if rest.starts_with("/*") {
                self.skip_block_comment()?;
                continue;
            }
            if rest.starts_with(self.delimiter.as_str()) {
                self.pos += self.delimiter.len();
                self.finish_statement();
                continue;
            }

            let Some(c) = rest.chars().next() else {
                break;
            };
            match c {
                '\'' | '"' | '`' => {
                    self.mark_content();
                    self.skip_quoted()?;
                }
                '\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                c if c.is_whitespace() => self.pos += c.len_utf8(),
                c => {
                    self.mark_content();
                    self.pos += c.len_utf8();
                }
            }
        }

        if self.start < self.src.len() {
            self.finish_statement();
        }
        Ok(())
    }

    fn mark_content(&mut self) {
        if !self.has_content {
            self.has_content = true;
            self.start_line = self.line;
        }
    }

    fn finish_statement(&mut self) {
        let text = &self.src[self.start..self.pos];
        let (kind, object, schema) = if self.has_content {
            classify(text, &self.delimiter)
        } else {
            (StatementType::Noop, None, None)
        };
        self.statements.push(Statement {
            file: self.file.clone(),
            line: if self.has_content { self.start_line } else { self.line },
            text: text.to_string(),
            kind,
            object,
            schema,
            delimiter: self.delimiter.clone(),
        });
        self.start = self.pos;
        self.has_content = false;
    }

    fn delimiter_command(&mut self) -> Result<()> {
        self.mark_content();
        let rest = &self.src[self.pos..];
        let eol = rest.find('\n').unwrap_or(rest.len());
        let new_delimiter = rest[9..eol].split_whitespace().next().unwrap_or("");
        if new_delimiter.is_empty() {
            return Err(Error::EmptyDelimiter {
                file: self.file.clone(),
                line: self.line,
            });
        }
        let new_delimiter = new_delimiter.to_string();
        self.pos += eol;

        let text = &self.src[self.start..self.pos];
        self.statements.push(Statement {
            file: self.file.clone(),
            line: self.start_line,
            text: text.to_string(),
            kind: StatementType::Command,
            object: None,
            schema: None,
            delimiter: self.delimiter.clone(),
        });
        self.delimiter = new_delimiter;
        self.start = self.pos;
        self.has_content = false;
        Ok(())
    }

    fn skip_line_comment(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.find('\n').unwrap_or(rest.len());
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        let open_line = self.line;
        let rest = &self.src[self.pos + 2..];
        match rest.find("*/") {
            Some(end) => {
                self.line += rest[..end].matches('\n').count();
                self.pos += 2 + end + 2;
                Ok(())
            }
            None => Err(Error::UnterminatedComment {
                file: self.file.clone(),
                line: open_line,
            }),
        }
    }

    fn skip_quoted(&mut self) -> Result<()> {
        let bytes = self.src.as_bytes();
        let quote = bytes[self.pos];
        let open_line = self.line;
        let mut i = self.pos + 1;

        while i < bytes.len() {
            match bytes[i] {
                b'\\' if quote != b'`' => {
                    if bytes.get(i + 1) == Some(&b'\n') {
                        self.line += 1;
                    }
                    i += 2;
                }
                b'\n' => {
                    self.line += 1;
                    i += 1;
                }
                b if b == quote => {
                    if bytes.get(i + 1) == Some(&quote) {
                        i += 2;
                    } else {
                        self.pos = i + 1;
                        return Ok(());
                    }
                }
                _ => i += 1,
            }
        }

        Err(Error::UnterminatedQuote {
            file: self.file.clone(),
            line: open_line,
            quote: quote as char,
        })
    }
}

fn is_delimiter_command(rest: &str) -> bool {
    rest.get(..9)
        .is_some_and(|word| word.eq_ignore_ascii_case("delimiter"))
        && rest[9..].starts_with([' ', '\t'])
}
