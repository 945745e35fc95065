//! Processing of one target: diff, verify, apply

use super::backend::{ApplyOptions, Backend, BackendError, DdlStatement};
use super::printer::Printer;
use super::result::TargetResult;
use super::target::Target;
use super::ApplyError;

const ALTER_ALGORITHMS: &[&str] = &["inplace", "copy", "instant"];
const ALTER_LOCKS: &[&str] = &["none", "shared", "exclusive"];

/// Settings read from a target's directory config
#[derive(Debug, Clone, Default)]
struct Settings {
    dry_run: bool,
    verify: bool,
    allow_unsafe: bool,
    safe_below_size: u64,
    alter_algorithm: String,
    alter_lock: String,
    apply: ApplyOptions,
}

impl Settings {
    fn load(target: &Target) -> Result<Self, ApplyError> {
        let config = &target.dir.config;
        let bad = |e: crate::config::Error| ApplyError::Config(e.to_string());
        Ok(Self {
            dry_run: config.get_bool("dry-run"),
            verify: config.get_bool("verify"),
            allow_unsafe: config.get_bool("allow-unsafe"),
            safe_below_size: config.get_size("safe-below-size").map_err(bad)?,
            alter_algorithm: config.get_enum("alter-algorithm", ALTER_ALGORITHMS).map_err(bad)?,
            alter_lock: config.get_enum("alter-lock", ALTER_LOCKS).map_err(bad)?,
            apply: ApplyOptions {
                foreign_key_checks: config.get_bool("foreign-key-checks"),
            },
        })
    }

    /// Why `statement` is refused, or `None` if it may run
    fn refusal(&self, statement: &DdlStatement) -> Option<String> {
        let reason = statement.unsafe_reason()?;
        if self.allow_unsafe {
            return None;
        }
        match statement.table_size {
            Some(size) if size < self.safe_below_size => None,
            Some(size) => Some(format!(
                "unsafe statement ({reason}, table size {}); use --allow-unsafe or raise --safe-below-size",
                crate::ui::format_size(size)
            )),
            None => Some(format!(
                "unsafe statement ({reason}); use --allow-unsafe or --safe-below-size to permit"
            )),
        }
    }
}

/// Process one target fully.
///
/// Per-target failures end up in the returned result; only errors that
/// make the whole run meaningless come back as `Err`.
pub fn process(
    target: Target,
    backend: &dyn Backend,
    printer: &Printer,
) -> Result<TargetResult, ApplyError> {
    let settings = Settings::load(&target)?;
    let mut result = TargetResult::new(target.to_string());
    log::info!("{target}: generating diff");

    let diff = match backend.diff(&target) {
        Ok(diff) => diff,
        Err(e) => return handle_backend_error(e, result),
    };
    for object in &diff.unsupported {
        log::warn!("{target}: unsupported changes to {object}");
    }
    result.unsupported += diff.unsupported.len();

    let statements: Vec<DdlStatement> = diff
        .statements
        .into_iter()
        .map(|s| s.with_alter_clauses(&settings.alter_algorithm, &settings.alter_lock))
        .collect();
    if statements.is_empty() {
        log::info!("{target}: no differences");
        return Ok(result);
    }
    result.differences = true;

    let refusals: Vec<(usize, String)> = statements
        .iter()
        .enumerate()
        .filter_map(|(i, s)| settings.refusal(s).map(|reason| (i, reason)))
        .collect();

    if settings.dry_run {
        printer.print_ddl(&target, &statements, &refusals);
        return Ok(result);
    }

    if let Some((_, reason)) = refusals.first() {
        printer.print_ddl(&target, &statements, &refusals);
        return Ok(result.skip(reason.clone()));
    }

    if settings.verify
        && let Err(e) = backend.verify(&target, &statements)
    {
        return handle_backend_error(e, result);
    }

    printer.print_ddl(&target, &statements, &[]);
    for statement in &statements {
        match backend.apply(&target, statement, &settings.apply) {
            Ok(()) => result.applied += 1,
            Err(BackendError::Unsupported(what)) => {
                log::warn!("{target}: {what}");
                result.unsupported += 1;
            }
            Err(e) => return handle_backend_error(e, result),
        }
    }
    log::info!("{target}: applied {} statement(s)", result.applied);
    Ok(result)
}

fn handle_backend_error(
    error: BackendError,
    mut result: TargetResult,
) -> Result<TargetResult, ApplyError> {
    match error {
        BackendError::Config(message) => Err(ApplyError::Config(message)),
        BackendError::Unsupported(what) => {
            log::warn!("{}: {what}", result.target);
            result.unsupported += 1;
            Ok(result)
        }
        BackendError::Failed(message) => Ok(result.skip(message)),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::applier::backend::DiffOutcome;
    use crate::applier::printer::tests::Buffer;
    use crate::applier::target::{WalkOptions, dir_targets};
    use crate::config::tests::base_config;
    use crate::fs::Dir;
    use std::sync::{Arc, Mutex};

    /// Backend returning canned answers and recording what it ran
    #[derive(Default)]
    pub(crate) struct FakeBackend {
        pub(crate) diff: Vec<&'static str>,
        pub(crate) sizes: Vec<(&'static str, u64)>,
        pub(crate) unsupported: Vec<&'static str>,
        pub(crate) diff_error: Option<BackendError>,
        pub(crate) verify_error: Option<BackendError>,
        pub(crate) apply_error: Option<BackendError>,
        pub(crate) applied: Mutex<Vec<String>>,
        pub(crate) verified: Mutex<usize>,
    }

    impl Backend for FakeBackend {
        fn diff(&self, _target: &Target) -> Result<DiffOutcome, BackendError> {
            if let Some(e) = &self.diff_error {
                return Err(e.clone());
            }
            let statements = self
                .diff
                .iter()
                .map(|text| {
                    let mut stmt = DdlStatement::parse(text);
                    stmt.table_size = stmt.object.as_ref().and_then(|o| {
                        self.sizes.iter().find(|(n, _)| *n == o.name).map(|(_, s)| *s)
                    });
                    stmt
                })
                .collect();
            Ok(DiffOutcome {
                statements,
                unsupported: self.unsupported.iter().map(ToString::to_string).collect(),
            })
        }

        fn verify(&self, _target: &Target, _statements: &[DdlStatement]) -> Result<(), BackendError> {
            *self.verified.lock().unwrap() += 1;
            self.verify_error.clone().map_or(Ok(()), Err)
        }

        fn apply(
            &self,
            _target: &Target,
            statement: &DdlStatement,
            _options: &ApplyOptions,
        ) -> Result<(), BackendError> {
            if let Some(e) = &self.apply_error {
                return Err(e.clone());
            }
            self.applied.lock().unwrap().push(statement.text.clone());
            Ok(())
        }
    }

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

    fn run(options: &str, backend: &FakeBackend) -> (Result<TargetResult, ApplyError>, String) {
        let (_tmp, target) = target(options);
        let buffer = Buffer::default();
        let printer = Printer::with_writer(false, Box::new(buffer.clone()));
        let result = process(target, backend, &printer);
        (result, buffer.contents())
    }

    #[test]
    fn test_applies_statements() {
        let backend = FakeBackend {
            diff: vec!["ALTER TABLE users ADD COLUMN c int", "CREATE TABLE t (id int)"],
            ..FakeBackend::default()
        };
        let (result, out) = run("alter-algorithm=INPLACE\n", &backend);
        let result = result.unwrap();
        assert!(result.differences);
        assert_eq!(result.applied, 2);
        assert_eq!(result.skipped, 0);
        assert_eq!(*backend.verified.lock().unwrap(), 1);
        assert_eq!(
            *backend.applied.lock().unwrap(),
            vec!["ALTER TABLE users ADD COLUMN c int, ALGORITHM=INPLACE", "CREATE TABLE t (id int)"]
        );
        assert!(out.contains("USE `app`;"));
    }

    #[test]
    fn test_no_differences() {
        let backend = FakeBackend::default();
        let (result, out) = run("", &backend);
        let result = result.unwrap();
        assert!(!result.differences);
        assert_eq!(*backend.verified.lock().unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_dry_run_prints_only() {
        let backend = FakeBackend {
            diff: vec!["DROP TABLE old"],
            ..FakeBackend::default()
        };
        let (result, out) = run("dry-run\n", &backend);
        let result = result.unwrap();
        assert!(result.differences);
        assert_eq!(result.skipped, 0);
        assert!(backend.applied.lock().unwrap().is_empty());
        assert_eq!(*backend.verified.lock().unwrap(), 0);
        assert!(out.contains("-- WARNING: unsafe statement"));
        assert!(out.contains("DROP TABLE old;"));
    }

    #[test]
    fn test_unsafe_refused_in_real_run() {
        let backend = FakeBackend {
            diff: vec!["ALTER TABLE users DROP COLUMN email"],
            ..FakeBackend::default()
        };
        let (result, _) = run("", &backend);
        let result = result.unwrap();
        assert_eq!(result.skipped, 1);
        assert!(result.error.unwrap().contains("unsafe"));
        assert!(backend.applied.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unsafe_permitted() {
        let backend = FakeBackend {
            diff: vec!["DROP TABLE users"],
            sizes: vec![("users", 100)],
            ..FakeBackend::default()
        };
        assert_eq!(run("allow-unsafe\n", &backend).0.unwrap().applied, 1);
        assert_eq!(run("safe-below-size=1KB\n", &backend).0.unwrap().applied, 1);
        assert_eq!(run("safe-below-size=50\n", &backend).0.unwrap().skipped, 1);

        let big = FakeBackend {
            diff: vec!["DROP TABLE users"],
            sizes: vec![("users", 3 << 20)],
            ..FakeBackend::default()
        };
        let error = run("safe-below-size=1MB\n", &big).0.unwrap().error.unwrap();
        assert!(error.contains("table size 3MB"), "{error}");
    }

    #[test]
    fn test_unknown_size_is_not_safe() {
        let backend = FakeBackend {
            diff: vec!["DROP TABLE users"],
            ..FakeBackend::default()
        };
        assert_eq!(run("safe-below-size=1GB\n", &backend).0.unwrap().skipped, 1);
    }

    #[test]
    fn test_per_target_failures() {
        let verify_fails = FakeBackend {
            diff: vec!["CREATE TABLE t (id int)"],
            verify_error: Some(BackendError::Failed("verification failed".into())),
            ..FakeBackend::default()
        };
        let result = run("", &verify_fails).0.unwrap();
        assert_eq!(result.skipped, 1);
        assert!(verify_fails.applied.lock().unwrap().is_empty());

        let skip_verify = run("skip-verify\n", &verify_fails).0.unwrap();
        assert_eq!(skip_verify.applied, 1);

        let diff_fails = FakeBackend {
            diff_error: Some(BackendError::Failed("no route".into())),
            ..FakeBackend::default()
        };
        assert_eq!(run("", &diff_fails).0.unwrap().error.as_deref(), Some("no route"));
    }

    #[test]
    fn test_unsupported_is_counted() {
        let backend = FakeBackend {
            diff: vec!["CREATE TABLE t (id int)"],
            unsupported: vec!["table `legacy`"],
            ..FakeBackend::default()
        };
        let result = run("", &backend).0.unwrap();
        assert_eq!(result.unsupported, 1);
        assert_eq!(result.applied, 1);
    }

    #[test]
    fn test_config_errors_are_fatal() {
        let backend = FakeBackend {
            diff: vec!["CREATE TABLE t (id int)"],
            apply_error: Some(BackendError::Config("no ddl-wrapper".into())),
            ..FakeBackend::default()
        };
        assert!(matches!(run("", &backend).0, Err(ApplyError::Config(_))));
        assert!(matches!(
            run("alter-lock=sometimes\n", &FakeBackend::default()).0,
            Err(ApplyError::Config(_))
        ));
    }
}
