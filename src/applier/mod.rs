//! Concurrent push pipeline
//!
//! ```text
//! producer thread ──targets (bounded)──▶ worker pool ──results──▶ caller
//!        ▲                                    │
//!        └──────────── CancelToken ◀──────────┘ (run-fatal error)
//! ```

pub mod backend;
pub mod printer;
pub mod result;
pub mod target;
pub mod worker;
pub mod wrapper;

pub use backend::{ApplyOptions, Backend, BackendError, DdlStatement, DiffOutcome};
pub use printer::Printer;
pub use result::{Outcome, Summary, TargetResult};
pub use target::{Target, WalkOptions};
pub use wrapper::WrapperBackend;

use crate::fs::{self, Dir};
use crossbeam_channel::bounded;
use std::sync::Arc;
use thiserror::Error;
use workpool::CancelToken;

/// Errors that end the whole run
#[derive(Debug, Error)]
pub enum ApplyError {
    /// Configuration makes the run impossible
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Fatal(String),
}

impl From<fs::Error> for ApplyError {
    fn from(e: fs::Error) -> Self {
        match e {
            fs::Error::Config(inner) => ApplyError::Config(inner.to_string()),
            other => ApplyError::Fatal(other.to_string()),
        }
    }
}

impl From<workpool::Error> for ApplyError {
    fn from(e: workpool::Error) -> Self {
        ApplyError::Fatal(e.to_string())
    }
}

/// Push every target under `root` with `workers` concurrent workers.
pub fn run(
    root: Arc<Dir>,
    backend: &dyn Backend,
    printer: &Printer,
    workers: usize,
    options: WalkOptions,
) -> Result<Summary, ApplyError> {
    let token = CancelToken::new();
    let (tx, rx) = bounded(workers.max(1));
    let producer = target::spawn_producer(root, tx, token.clone(), options)
        .map_err(|e| ApplyError::Fatal(format!("cannot start target producer: {e}")))?;

    let outcome = workpool::run(workers, &rx, &token, |target| {
        worker::process(target, backend, printer)
    });
    // Unblocks the producer if the pool never started.
    drop(rx);
    if outcome.is_err() {
        token.cancel();
    }

    let walked = producer
        .join()
        .map_err(|_| ApplyError::Fatal("target producer panicked".to_string()))?;
    let outcome = outcome?;
    if let Some(error) = outcome.error {
        return Err(error);
    }
    let skipped = walked?;

    let summary = Summary::new(&outcome.results, skipped);
    log::debug!(
        "run finished: {} target(s), {} applied, {} skipped, {} unsupported",
        outcome.results.len(),
        summary.applied,
        summary.skipped,
        summary.unsupported
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::printer::tests::Buffer;
    use crate::applier::worker::tests::FakeBackend;
    use crate::config::tests::base_config;

    fn tree(files: &[(&str, &str)]) -> (tempfile::TempDir, Arc<Dir>) {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join(".git")).unwrap();
        for (rel, content) in files {
            let path = tmp.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let root = Arc::new(Dir::parse(tmp.path(), &base_config(&[])).unwrap());
        (tmp, root)
    }

    fn sharded() -> (tempfile::TempDir, Arc<Dir>) {
        tree(&[
            (".schemer", "host=a,b,c\nschema=s1,s2,s3\n"),
            ("t.sql", "CREATE TABLE users (id int);\n"),
            ("broken/.schemer", "schema=x\n"),
            ("broken/t.sql", "CREATE TABLE a (id int);\nCREATE TABLE a (id int);\n"),
        ])
    }

    #[test]
    fn test_every_target_yields_one_result() {
        let (_tmp, root) = sharded();
        let backend = FakeBackend {
            diff: vec!["CREATE TABLE t (id int)"],
            ..FakeBackend::default()
        };
        let printer = Printer::with_writer(false, Box::new(Buffer::default()));
        let summary = run(root, &backend, &printer, 4, WalkOptions::default()).unwrap();
        assert_eq!(summary.applied, 9);
        assert_eq!(summary.skipped, 1);
        assert!(matches!(summary.outcome(false), Outcome::Failure(_)));
    }

    #[test]
    fn test_config_error_ends_run() {
        let (_tmp, root) = sharded();
        let backend = FakeBackend {
            diff: vec!["CREATE TABLE t (id int)"],
            apply_error: Some(BackendError::Config("no ddl-wrapper configured".into())),
            ..FakeBackend::default()
        };
        let printer = Printer::with_writer(false, Box::new(Buffer::default()));
        let err = run(root, &backend, &printer, 2, WalkOptions::default()).unwrap_err();
        assert!(matches!(err, ApplyError::Config(ref m) if m == "no ddl-wrapper configured"));
    }

    #[test]
    fn test_dry_run_brief_output() {
        let (_tmp, root) = tree(&[
            (".schemer", "host=a,b\nschema=s1,s2\ndry-run\n"),
            ("t.sql", "CREATE TABLE users (id int);\n"),
        ]);
        let backend = FakeBackend {
            diff: vec!["ALTER TABLE users ADD COLUMN c int"],
            ..FakeBackend::default()
        };
        let buffer = Buffer::default();
        let printer = Printer::with_writer(true, Box::new(buffer.clone()));
        let summary = run(root, &backend, &printer, 1, WalkOptions::default()).unwrap();
        assert_eq!(summary.outcome(true), Outcome::DifferencesFound);
        assert_eq!(buffer.contents(), "a:3306\nb:3306\n");
    }

    #[test]
    fn test_fatal_tree_error() {
        let (_tmp, root) = tree(&[(".schemer", "host=a\n"), ("sub/.schemer", "bogus=1\n")]);
        let printer = Printer::with_writer(false, Box::new(Buffer::default()));
        let err = run(root, &FakeBackend::default(), &printer, 1, WalkOptions::default())
            .unwrap_err();
        assert!(matches!(err, ApplyError::Config(_)));
    }
}
