//! Per-target results and the run summary

use std::fmt::Write as _;

/// Outcome of processing one target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetResult {
    /// `instance schema` label of the target
    pub target: String,
    pub differences: bool,
    pub applied: usize,
    pub unsupported: usize,
    pub skipped: usize,
    pub error: Option<String>,
}

impl TargetResult {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Mark the target skipped with `reason`
    pub fn skip(mut self, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        log::warn!("Skipping {}: {reason}", self.target);
        self.skipped += 1;
        self.error = Some(reason);
        self
    }
}

/// How the run ended, before mapping to a process exit code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Dry run found differences
    DifferencesFound,
    /// Only unsupported objects were left behind
    PartialFailure(String),
    /// At least one target or directory was skipped
    Failure(String),
}

/// Additive totals of a run
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub differences: bool,
    pub applied: usize,
    pub unsupported: usize,
    pub skipped: usize,
    /// `(target, error)` pairs, in arrival order
    pub errors: Vec<(String, String)>,
}

impl Summary {
    /// Sum target results with the skips counted during enumeration
    pub fn new(results: &[TargetResult], dir_skips: usize) -> Self {
        let mut summary = Self {
            skipped: dir_skips,
            ..Self::default()
        };
        for result in results {
            summary.add(result);
        }
        summary
    }

    pub fn add(&mut self, result: &TargetResult) {
        self.differences |= result.differences;
        self.applied += result.applied;
        self.unsupported += result.unsupported;
        self.skipped += result.skipped;
        if let Some(error) = &result.error {
            self.errors.push((result.target.clone(), error.clone()));
        }
    }

    /// Classify the run. Skips and unsupported objects take precedence over
    /// dry-run differences.
    pub fn outcome(&self, dry_run: bool) -> Outcome {
        if self.skipped == 0 && self.unsupported == 0 {
            return if dry_run && self.differences {
                Outcome::DifferencesFound
            } else {
                Outcome::Success
            };
        }
        if self.skipped == 0 {
            Outcome::PartialFailure(self.message())
        } else {
            Outcome::Failure(self.message())
        }
    }

    /// Multi-line description of everything that went wrong
    pub fn message(&self) -> String {
        let mut out = String::new();
        if self.skipped > 0 {
            let _ = writeln!(out, "Skipped {} operation(s) due to problems", self.skipped);
        }
        if self.unsupported > 0 {
            let _ = writeln!(
                out,
                "Skipped {} object(s) with unsupported features",
                self.unsupported
            );
        }
        if !self.errors.is_empty() {
            let _ = writeln!(out, "Errors:");
            for (target, error) in &self.errors {
                let _ = writeln!(out, "  {target}: {error}");
            }
        }
        out.trim_end().to_string()
    }
}
