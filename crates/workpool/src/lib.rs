//! # workpool
//!
//! Bounded producer/worker/aggregator pipeline with cooperative cancellation.
//!
//! A producer feeds jobs into a bounded channel, a fixed number of workers
//! process them on a dedicated thread pool, and the calling thread collects
//! results. Any worker can abort the whole run with a fatal error; every
//! other participant notices through a shared [`CancelToken`].
//!
//! ## Example
//!
//! ```
//! use crossbeam_channel::bounded;
//! use workpool::{CancelToken, run};
//!
//! let (tx, rx) = bounded(2);
//! let producer = std::thread::spawn(move || {
//!     for n in 1..=4u32 {
//!         tx.send(n).unwrap();
//!     }
//! });
//!
//! let token = CancelToken::new();
//! let outcome = run(2, &rx, &token, |n| Ok::<_, String>(n * n)).unwrap();
//! producer.join().unwrap();
//!
//! let mut squares = outcome.into_result().unwrap();
//! squares.sort_unstable();
//! assert_eq!(squares, vec![1, 4, 9, 16]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod pool;
pub mod token;
pub mod types;

pub use pool::run;
pub use token::CancelToken;
pub use types::{Error, PoolOutcome, Result};
