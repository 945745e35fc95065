//! Core types for pool runs

use thiserror::Error;

/// Errors starting a pool run (never errors from the jobs themselves).
#[derive(Debug, Error)]
pub enum Error {
    /// Worker count must be at least one
    #[error("worker count cannot be less than 1")]
    NoWorkers,

    /// The underlying thread pool could not be created
    #[error("failed to create worker thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything a pool run produced.
///
/// `results` holds one entry per job that completed, in arrival order.
/// `error` holds the first fatal error reported by any worker; once set,
/// the run was cancelled and remaining jobs were left unprocessed.
#[derive(Debug)]
pub struct PoolOutcome<R, E> {
    /// Results of completed jobs
    pub results: Vec<R>,
    /// First fatal error, if any
    pub error: Option<E>,
}

impl<R, E> PoolOutcome<R, E> {
    /// Whether a worker reported a fatal error
    pub fn is_fatal(&self) -> bool {
        self.error.is_some()
    }

    /// Convert to a plain result, discarding partial results on error
    pub fn into_result(self) -> std::result::Result<Vec<R>, E> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.results),
        }
    }
}
