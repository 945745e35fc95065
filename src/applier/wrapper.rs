//! Backend that shells out to the configured external tools
//!
//! ```text
//! diff-wrapper     prints the DDL needed for the target, one statement per
//!                  `;`, with optional `-- unsupported: <object>` and
//!                  `-- size <table> <bytes>` annotation lines
//! verify-wrapper   receives every statement in {DDL}; nonzero exit = mismatch
//! ddl-wrapper      runs one statement
//! alter-wrapper    runs ALTER TABLE on tables of alter-wrapper-min-size or more
//! ```

use super::backend::{ApplyOptions, Backend, BackendError, DdlKind, DdlStatement, DiffOutcome};
use super::target::Target;
use crate::shellout::{self, Variables};
use indexmap::IndexMap;
use sqlfile::StatementType;
use std::path::Path;
use std::time::Duration;

const UNSUPPORTED_PREFIX: &str = "-- unsupported:";
const SIZE_PREFIX: &str = "-- size ";

/// Per-command limit for wrappers; online schema change tools may run for hours
pub const WRAPPER_TIMEOUT: Duration = Duration::from_secs(4 * 60 * 60);

/// [`Backend`] driven by the External tool options
#[derive(Debug, Clone)]
pub struct WrapperBackend {
    /// Per-command limit; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for WrapperBackend {
    fn default() -> Self {
        Self {
            timeout: Some(WRAPPER_TIMEOUT),
        }
    }
}

impl WrapperBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    fn run(&self, template: &str, vars: &Variables) -> Result<String, BackendError> {
        log::debug!("running wrapper: {template}");
        shellout::run_templated_command(template, vars, self.timeout).map_err(|e| match e {
            shellout::Error::UnknownVariable { .. } => BackendError::Config(e.to_string()),
            other => BackendError::Failed(other.to_string()),
        })
    }
}

impl Backend for WrapperBackend {
    fn diff(&self, target: &Target) -> Result<DiffOutcome, BackendError> {
        let config = &target.dir.config;
        let template = config.get("diff-wrapper").trim();
        if template.is_empty() {
            return Err(BackendError::Config(
                "no diff-wrapper configured; cannot compute differences".to_string(),
            ));
        }

        let mut vars = variables(target);
        let desired: Vec<&str> = target
            .logical_schema()
            .creates
            .values()
            .map(|stmt| stmt.body())
            .collect();
        vars.insert("DDL".into(), desired.join(";\n"));
        vars.insert("TYPE".into(), "DIFF".into());
        vars.insert(
            "EXACTMATCH".into(),
            if config.get_bool("exact-match") { "1" } else { "0" }.into(),
        );

        let output = self.run(template, &vars)?;
        parse_diff_output(&output, &target.dir.path)
    }

    fn verify(&self, target: &Target, statements: &[DdlStatement]) -> Result<(), BackendError> {
        let template = target.dir.config.get("verify-wrapper").trim();
        if template.is_empty() {
            log::debug!("{target}: no verify-wrapper configured, skipping verification");
            return Ok(());
        }
        let mut vars = variables(target);
        let ddl: Vec<String> = statements.iter().map(ToString::to_string).collect();
        vars.insert("DDL".into(), ddl.join("\n"));
        vars.insert("TYPE".into(), "VERIFY".into());
        self.run(template, &vars)
            .map(drop)
            .map_err(|e| match e {
                BackendError::Failed(reason) => {
                    BackendError::Failed(format!("verification failed: {reason}"))
                }
                other => other,
            })
    }

    fn apply(
        &self,
        target: &Target,
        statement: &DdlStatement,
        options: &ApplyOptions,
    ) -> Result<(), BackendError> {
        let template = choose_wrapper(target, statement)?;

        let mut vars = variables(target);
        vars.insert("DDL".into(), statement.to_string());
        vars.insert("TYPE".into(), statement.kind.as_str().into());
        vars.insert(
            "NAME".into(),
            statement.object.as_ref().map(|o| o.name.clone()).unwrap_or_default(),
        );
        vars.insert("CLAUSES".into(), statement.clauses.clone());
        vars.insert(
            "FKCHECKS".into(),
            if options.foreign_key_checks { "1" } else { "0" }.into(),
        );
        vars.insert("SIZE".into(), statement.table_size.unwrap_or(0).to_string());

        log::info!("{target}: applying {}", statement.kind.as_str());
        let output = self.run(&template, &vars)?;
        if !output.trim().is_empty() {
            log::debug!("{target}: {}", output.trim());
        }
        Ok(())
    }
}

/// `alter-wrapper` for big enough ALTER TABLEs, `ddl-wrapper` otherwise
fn choose_wrapper(target: &Target, statement: &DdlStatement) -> Result<String, BackendError> {
    let config = &target.dir.config;
    let ddl_wrapper = config.get("ddl-wrapper").trim();
    let alter_wrapper = config.get("alter-wrapper").trim();

    if !alter_wrapper.is_empty() && statement.kind == DdlKind::Alter && statement.is_table() {
        let min_size = config
            .get_size("alter-wrapper-min-size")
            .map_err(|e| BackendError::Config(e.to_string()))?;
        if statement.table_size.unwrap_or(0) >= min_size {
            return Ok(alter_wrapper.to_string());
        }
    }
    if !ddl_wrapper.is_empty() {
        return Ok(ddl_wrapper.to_string());
    }
    Err(BackendError::Config(
        "neither ddl-wrapper nor alter-wrapper is configured for this statement; cannot apply DDL"
            .to_string(),
    ))
}

/// Variables common to every wrapper invocation
fn variables(target: &Target) -> Variables {
    let dir = &target.dir;
    let config = &dir.config;
    let instance = &target.instance;
    let mut vars = Variables::new();
    vars.insert("HOST".into(), instance.host.clone());
    vars.insert("PORT".into(), instance.port.to_string());
    vars.insert("SOCKET".into(), instance.socket.clone().unwrap_or_default());
    vars.insert("SCHEMA".into(), target.schema_name.clone());
    vars.insert("USER".into(), config.get("user").to_string());
    vars.insert("ENVIRONMENT".into(), config.environment().to_string());
    vars.insert("DIRNAME".into(), dir.base_name());
    vars.insert("DIRPATH".into(), dir.path.display().to_string());
    vars.insert("CONNOPTS".into(), instance.params.encode());
    vars
}

/// Split diff-wrapper output into statements, collecting annotations
fn parse_diff_output(output: &str, dir: &Path) -> Result<DiffOutcome, BackendError> {
    let mut outcome = DiffOutcome::default();
    let mut sizes: IndexMap<String, u64> = IndexMap::new();

    for line in output.lines().map(str::trim) {
        if let Some(object) = line.strip_prefix(UNSUPPORTED_PREFIX) {
            outcome.unsupported.push(object.trim().to_string());
        } else if let Some(rest) = line.strip_prefix(SIZE_PREFIX) {
            let mut fields = rest.split_whitespace();
            match (fields.next(), fields.next().map(str::parse::<u64>)) {
                (Some(table), Some(Ok(bytes))) => {
                    sizes.insert(table.trim_matches('`').to_string(), bytes);
                }
                _ => log::debug!("ignoring malformed size annotation: {line}"),
            }
        }
    }

    let statements = sqlfile::parse_string(output, &dir.join("diff-wrapper"))
        .map_err(|e| BackendError::Failed(format!("cannot parse diff-wrapper output: {e}")))?;
    for stmt in statements {
        if stmt.kind == StatementType::Noop || stmt.kind == StatementType::Command {
            continue;
        }
        let mut ddl = DdlStatement::parse(stmt.body());
        if ddl.is_table() {
            ddl.table_size = ddl
                .object
                .as_ref()
                .and_then(|o| sizes.get(&o.name).copied());
        }
        outcome.statements.push(ddl);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::target::{WalkOptions, dir_targets};
    use crate::config::tests::base_config;
    use crate::fs::Dir;
    use sqlfile::ObjectKey;
    use std::sync::Arc;

    fn target(options: &str) -> (tempfile::TempDir, Target) {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join(".git")).unwrap();
        std::fs::write(tmp.path().join(".schemer"), format!("host=db\nschema=app\n{options}"))
            .unwrap();
        std::fs::write(tmp.path().join("t.sql"), "CREATE TABLE users (id int);\n").unwrap();
        let dir = Arc::new(Dir::parse(tmp.path(), &base_config(&[])).unwrap());
        let mut found = dir_targets(&dir, WalkOptions::default());
        (tmp, found.targets.remove(0))
    }

    #[test]
    fn test_parse_diff_output() {
        let output = "-- unsupported: table `legacy`\n\
                      -- size users 2048\n\
                      ALTER TABLE users ADD COLUMN c int;\n\
                      DROP VIEW v;\n\
                      -- trailing comment\n";
        let outcome = parse_diff_output(output, Path::new("/repo")).unwrap();
        assert_eq!(outcome.unsupported, vec!["table `legacy`"]);
        assert_eq!(outcome.statements.len(), 2);
        assert_eq!(outcome.statements[0].object, Some(ObjectKey::table("users")));
        assert_eq!(outcome.statements[0].table_size, Some(2048));
        assert_eq!(outcome.statements[1].kind, DdlKind::Drop);
        assert_eq!(outcome.statements[1].table_size, None);
    }

    #[test]
    fn test_variables() {
        let (_tmp, target) = target("");
        let vars = variables(&target);
        assert_eq!(vars["HOST"], "db");
        assert_eq!(vars["PORT"], "3306");
        assert_eq!(vars["SOCKET"], "");
        assert_eq!(vars["SCHEMA"], "app");
        assert_eq!(vars["USER"], "root");
        assert_eq!(vars["ENVIRONMENT"], "production");
        assert!(vars["CONNOPTS"].contains("foreign_key_checks=1"));
    }

    #[test]
    fn test_missing_wrappers_are_config_errors() {
        let (_tmp, target) = target("");
        let backend = WrapperBackend::new();
        assert!(matches!(backend.diff(&target), Err(BackendError::Config(_))));
        let stmt = DdlStatement::parse("ALTER TABLE users ADD COLUMN c int");
        assert!(matches!(
            backend.apply(&target, &stmt, &ApplyOptions::default()),
            Err(BackendError::Config(_))
        ));
        assert!(backend.verify(&target, &[stmt]).is_ok());
    }

    #[test]
    fn test_choose_wrapper() {
        let (_tmp, target) = target(
            "ddl-wrapper=run-ddl\nalter-wrapper=run-alter\nalter-wrapper-min-size=1MB\n",
        );
        let mut alter = DdlStatement::parse("ALTER TABLE users ADD COLUMN c int");
        assert_eq!(choose_wrapper(&target, &alter).unwrap(), "run-ddl");
        alter.table_size = Some(2 * 1024 * 1024);
        assert_eq!(choose_wrapper(&target, &alter).unwrap(), "run-alter");
        let create = DdlStatement::parse("CREATE TABLE t (id int)");
        assert_eq!(choose_wrapper(&target, &create).unwrap(), "run-ddl");
    }

    #[cfg(unix)]
    #[test]
    fn test_diff_runs_wrapper() {
        let (_tmp, target) =
            target("diff-wrapper=printf 'ALTER TABLE %s ADD COLUMN c int;' {SCHEMA}\n");
        let outcome = WrapperBackend::new().diff(&target).unwrap();
        assert_eq!(outcome.statements.len(), 1);
        assert_eq!(outcome.statements[0].text, "ALTER TABLE app ADD COLUMN c int");
    }

    #[cfg(unix)]
    #[test]
    fn test_diff_receives_desired_definitions() {
        let (_tmp, target) = target("diff-wrapper=echo {DDL} | grep -q 'CREATE TABLE users'\n");
        let outcome = WrapperBackend::new().diff(&target).unwrap();
        assert!(outcome.statements.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_verify_and_apply_failures() {
        let (_tmp, target) = target("verify-wrapper=exit 3\nddl-wrapper=exit 1\n");
        let backend = WrapperBackend::new();
        let stmt = DdlStatement::parse("CREATE TABLE t (id int)");

        let err = backend.verify(&target, std::slice::from_ref(&stmt)).unwrap_err();
        assert!(matches!(err, BackendError::Failed(ref m) if m.starts_with("verification failed")));
        assert!(matches!(
            backend.apply(&target, &stmt, &ApplyOptions::default()),
            Err(BackendError::Failed(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_size_is_zero_when_unknown() {
        let (_tmp, target) = target("ddl-wrapper=test {SIZE} -eq 0\n");
        let backend = WrapperBackend::new();
        let create = DdlStatement::parse("CREATE TABLE t (id int)");
        assert!(backend.apply(&target, &create, &ApplyOptions::default()).is_ok());

        let mut alter = DdlStatement::parse("ALTER TABLE users ADD COLUMN c int");
        alter.table_size = Some(2048);
        assert!(matches!(
            backend.apply(&target, &alter, &ApplyOptions::default()),
            Err(BackendError::Failed(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_wrapper_timeout() {
        assert_eq!(WrapperBackend::new().timeout, Some(WRAPPER_TIMEOUT));

        let (_tmp, target) = target("ddl-wrapper=sleep 5\n");
        let backend = WrapperBackend::with_timeout(Some(Duration::from_millis(100)));
        let stmt = DdlStatement::parse("CREATE TABLE t (id int)");
        assert!(matches!(
            backend.apply(&target, &stmt, &ApplyOptions::default()),
            Err(BackendError::Failed(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_unknown_variable_is_config_error() {
        let (_tmp, target) = target("ddl-wrapper=run {NOPE}\n");
        let stmt = DdlStatement::parse("CREATE TABLE t (id int)");
        assert!(matches!(
            WrapperBackend::new().apply(&target, &stmt, &ApplyOptions::default()),
            Err(BackendError::Config(_))
        ));
    }
}
