//! Capability interface for generating, verifying and running DDL

use super::target::Target;
use regex::Regex;
use sqlfile::{ObjectKey, ObjectType};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static DDL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^(CREATE|ALTER|DROP)\s+(?:OR\s+REPLACE\s+)?(?:DEFINER\s*=\s*\S+\s+)?(TABLE|VIEW|PROCEDURE|FUNCTION|TRIGGER|EVENT)\s+(?:IF\s+(?:NOT\s+)?EXISTS\s+)?((?:`(?:[^`]|``)+`|[\w$]+)(?:\s*\.\s*(?:`(?:[^`]|``)+`|[\w$]+))?)(.*)$",
    )
    .expect("valid regex")
});

static DROP_CLAUSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bDROP\b").expect("valid regex"));

/// Errors from a backend operation.
///
/// `Config` aborts the whole run; the others only affect one target.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("{0}")]
    Config(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Failed(String),
}

/// Leading verb of a DDL statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlKind {
    Create,
    Alter,
    Drop,
    Other,
}

impl DdlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DdlKind::Create => "CREATE",
            DdlKind::Alter => "ALTER",
            DdlKind::Drop => "DROP",
            DdlKind::Other => "OTHER",
        }
    }
}

/// One generated DDL statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlStatement {
    pub text: String,
    pub kind: DdlKind,
    pub object: Option<ObjectKey>,
    /// Text following the object name (the clause list of an ALTER)
    pub clauses: String,
    /// Size of the affected table in bytes, when known
    pub table_size: Option<u64>,
}

impl DdlStatement {
    /// Classify statement text (without trailing delimiter)
    pub fn parse(text: &str) -> Self {
        let text = text.trim().trim_end_matches(';').trim_end().to_string();
        let Some(caps) = DDL_RE.captures(&text) else {
            return Self {
                text,
                kind: DdlKind::Other,
                object: None,
                clauses: String::new(),
                table_size: None,
            };
        };

        let kind = match caps[1].to_ascii_uppercase().as_str() {
            "CREATE" => DdlKind::Create,
            "ALTER" => DdlKind::Alter,
            _ => DdlKind::Drop,
        };
        let object = ObjectType::from_keyword(&caps[2]).map(|object_type| {
            let qualified = &caps[3];
            let name = qualified
                .rsplit('.')
                .next()
                .unwrap_or(qualified)
                .trim()
                .trim_matches('`')
                .replace("``", "`");
            ObjectKey::new(object_type, name)
        });
        let clauses = caps[4].trim().to_string();
        Self {
            text,
            kind,
            object,
            clauses,
            table_size: None,
        }
    }

    pub fn is_table(&self) -> bool {
        self.object
            .as_ref()
            .is_some_and(|o| o.object_type == ObjectType::Table)
    }

    /// Why the statement may destroy data, if it can
    pub fn unsafe_reason(&self) -> Option<String> {
        let object = self
            .object
            .as_ref()
            .map_or_else(|| "object".to_string(), ToString::to_string);
        match self.kind {
            DdlKind::Drop => Some(format!("DROP of {object}")),
            DdlKind::Alter if DROP_CLAUSE_RE.is_match(&self.clauses) => {
                Some(format!("ALTER of {object} drops a column, index or partition"))
            }
            _ => None,
        }
    }

    /// Append ALGORITHM/LOCK clauses to an ALTER TABLE
    pub fn with_alter_clauses(mut self, algorithm: &str, lock: &str) -> Self {
        if self.kind != DdlKind::Alter || !self.is_table() {
            return self;
        }
        for (name, value) in [("ALGORITHM", algorithm), ("LOCK", lock)] {
            if value.is_empty() {
                continue;
            }
            let clause = format!("{name}={}", value.to_ascii_uppercase());
            self.text = format!("{}, {clause}", self.text);
            self.clauses = format!("{}, {clause}", self.clauses);
        }
        self
    }
}

impl fmt::Display for DdlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};", self.text)
    }
}

/// Result of comparing a target's definitions with its live schema
#[derive(Debug, Clone, Default)]
pub struct DiffOutcome {
    pub statements: Vec<DdlStatement>,
    /// Objects whose differences cannot be expressed as DDL
    pub unsupported: Vec<String>,
}

/// Settings that shape how DDL is executed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    pub foreign_key_checks: bool,
}

/// External capability that knows how to talk to a database.
///
/// Implementations must be usable from several workers at once.
pub trait Backend: Send + Sync {
    /// Generate the DDL that makes the target's live schema match its files
    fn diff(&self, target: &Target) -> Result<DiffOutcome, BackendError>;

    /// Check generated DDL before running it for real
    fn verify(&self, target: &Target, statements: &[DdlStatement]) -> Result<(), BackendError>;

    /// Run one statement against the target
    fn apply(
        &self,
        target: &Target,
        statement: &DdlStatement,
        options: &ApplyOptions,
    ) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alter() {
        let stmt = DdlStatement::parse("ALTER TABLE `shop`.`orders` ADD COLUMN note text;");
        assert_eq!(stmt.kind, DdlKind::Alter);
        assert_eq!(stmt.object, Some(ObjectKey::table("orders")));
        assert_eq!(stmt.clauses, "ADD COLUMN note text");
        assert_eq!(stmt.text, "ALTER TABLE `shop`.`orders` ADD COLUMN note text");
        assert!(stmt.unsafe_reason().is_none());
    }

    #[test]
    fn test_unsafe_statements() {
        let drop = DdlStatement::parse("DROP TABLE users");
        assert_eq!(drop.kind, DdlKind::Drop);
        assert!(drop.unsafe_reason().unwrap().contains("table `users`"));

        let alter = DdlStatement::parse("alter table users drop column email, add key (id)");
        assert!(alter.unsafe_reason().is_some());

        let view = DdlStatement::parse("CREATE OR REPLACE VIEW v AS SELECT dropped FROM t");
        assert_eq!(view.kind, DdlKind::Create);
        assert!(view.unsafe_reason().is_none());
    }

    #[test]
    fn test_other_statement() {
        let stmt = DdlStatement::parse("SET foreign_key_checks=0");
        assert_eq!(stmt.kind, DdlKind::Other);
        assert!(stmt.object.is_none());
    }

    #[test]
    fn test_alter_clauses() {
        let stmt =
            DdlStatement::parse("ALTER TABLE t ADD COLUMN c int").with_alter_clauses("inplace", "none");
        assert_eq!(stmt.text, "ALTER TABLE t ADD COLUMN c int, ALGORITHM=INPLACE, LOCK=NONE");
        assert_eq!(
            stmt.to_string(),
            "ALTER TABLE t ADD COLUMN c int, ALGORITHM=INPLACE, LOCK=NONE;"
        );

        let create =
            DdlStatement::parse("CREATE TABLE t (id int)").with_alter_clauses("inplace", "");
        assert_eq!(create.text, "CREATE TABLE t (id int)");
    }
}
