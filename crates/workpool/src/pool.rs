//! Fixed-size worker pool - pulls jobs from a channel, pushes results to another

use crate::token::CancelToken;
use crate::types::{Error, PoolOutcome, Result};
use crossbeam_channel::{Receiver, Sender, select, unbounded};
use std::sync::Mutex;

/// Run `handler` over every job received from `input` using `workers` threads.
///
/// Each worker loops: stop if the token is cancelled, otherwise take the next
/// job (or stop once `input` is closed and empty), run the handler, and send
/// its result to the shared result queue. A handler returning `Err` is fatal
/// to the whole run: the error is kept (first one wins), the token is
/// cancelled, and the other workers stop before taking another job.
///
/// The calling thread acts as the aggregator. It receives results while the
/// workers run; after the last worker exits, anything still queued is
/// drained before the queue is dropped, so completed work is never lost.
///
/// # Arguments
/// * `workers` - Number of worker threads (must be at least 1)
/// * `input` - Job queue; the producer closes it by dropping its sender
/// * `token` - Shared cancellation token
/// * `handler` - Processes one job; `Err` cancels the run
pub fn run<T, R, E, F>(
    workers: usize,
    input: &Receiver<T>,
    token: &CancelToken,
    handler: F,
) -> Result<PoolOutcome<R, E>>
where
    T: Send,
    R: Send,
    E: Send,
    F: Fn(T) -> std::result::Result<R, E> + Sync,
{
    if workers == 0 {
        return Err(Error::NoWorkers);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("worker-{i}"))
        .build()?;

    let first_error: Mutex<Option<E>> = Mutex::new(None);
    let (results_tx, results_rx) = unbounded::<R>();
    let mut results = Vec::new();

    pool.in_place_scope(|scope| {
        for id in 0..workers {
            let results_tx = results_tx.clone();
            let token = token.clone();
            let handler = &handler;
            let first_error = &first_error;
            scope.spawn(move |_| {
                worker_loop(id, input, &token, handler, &results_tx, first_error);
            });
        }
        // Only worker clones keep the queue open from here on.
        drop(results_tx);

        for result in results_rx.iter() {
            results.push(result);
        }
        if token.is_cancelled() {
            log::debug!("run cancelled; drained {} completed result(s)", results.len());
        }
    });

    let error = match first_error.into_inner() {
        Ok(error) => error,
        Err(poisoned) => poisoned.into_inner(),
    };

    Ok(PoolOutcome { results, error })
}

fn worker_loop<T, R, E, F>(
    id: usize,
    input: &Receiver<T>,
    token: &CancelToken,
    handler: &F,
    results: &Sender<R>,
    first_error: &Mutex<Option<E>>,
) where
    F: Fn(T) -> std::result::Result<R, E>,
{
    let mut processed = 0usize;
    loop {
        if token.is_cancelled() {
            break;
        }
        let job = select! {
            recv(input) -> msg => match msg {
                Ok(job) => job,
                Err(_) => break,
            },
            recv(token.done()) -> _ => break,
        };
        if token.is_cancelled() {
            break;
        }

        match handler(job) {
            Ok(result) => {
                processed += 1;
                if results.send(result).is_err() {
                    break;
                }
            }
            Err(error) => {
                record_error(first_error, error);
                token.cancel();
                break;
            }
        }
    }
    log::trace!("worker {id} exiting after {processed} job(s)");
}

fn record_error<E>(slot: &Mutex<Option<E>>, error: E) {
    let mut locked = match slot.lock() {
        Ok(locked) => locked,
        Err(poisoned) => poisoned.into_inner(),
    };
    if locked.is_none() {
        *locked = Some(error);
    }
}
