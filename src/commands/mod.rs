//! Command descriptors, dispatch and exit values

pub mod push;

use crate::applier::Outcome;
use crate::config::{Config, OptionRegistry};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CODE_SUCCESS: i32 = 0;
pub const CODE_DIFFERENCES_FOUND: i32 = 1;
pub const CODE_PARTIAL_ERROR: i32 = 1;
pub const CODE_FATAL_ERROR: i32 = 2;
pub const CODE_BAD_CONFIG: i32 = 78;

/// Process exit status plus the message to show for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitValue {
    pub code: i32,
    pub message: String,
}

impl ExitValue {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn success() -> Self {
        Self::new(CODE_SUCCESS, "")
    }

    pub fn bad_config(message: impl Into<String>) -> Self {
        Self::new(CODE_BAD_CONFIG, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(CODE_FATAL_ERROR, message)
    }

    pub fn is_success(&self) -> bool {
        self.code == CODE_SUCCESS
    }
}

impl From<Outcome> for ExitValue {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => Self::success(),
            Outcome::DifferencesFound => Self::new(CODE_DIFFERENCES_FOUND, ""),
            Outcome::PartialFailure(message) => Self::new(CODE_PARTIAL_ERROR, message),
            Outcome::Failure(message) => Self::new(CODE_FATAL_ERROR, message),
        }
    }
}

/// What a handler gets to work with
#[derive(Debug)]
pub struct Invocation {
    /// Defaults plus command-line values
    pub config: Config,
    pub workdir: PathBuf,
}

pub type Handler = fn(&Invocation) -> ExitValue;

/// A runnable command: its options and the function that runs it
pub struct CommandSpec {
    pub name: &'static str,
    pub summary: &'static str,
    pub registry: Arc<OptionRegistry>,
    pub handler: Handler,
}

/// Build the base config from `overrides` and run the command in `workdir`.
pub fn dispatch(
    spec: &CommandSpec,
    environment: &str,
    overrides: &IndexMap<String, String>,
    workdir: &Path,
) -> ExitValue {
    let config = match Config::new(Arc::clone(&spec.registry), environment, overrides) {
        Ok(config) => config,
        Err(e) => return ExitValue::bad_config(e.to_string()),
    };
    log::debug!(
        "{}: environment {environment}, {} option(s) from the command line",
        spec.name,
        overrides.len()
    );
    (spec.handler)(&Invocation {
        config,
        workdir: workdir.to_path_buf(),
    })
}
