//! Cooperative cancellation shared by producers and workers.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Shared cancellation token.
///
/// Cloning is cheap; every clone observes the same state. Besides the flag
/// checked with [`CancelToken::is_cancelled`], the token exposes a channel via
/// [`CancelToken::done`] that disconnects on cancellation, so a thread blocked
/// in `crossbeam_channel::select!` wakes up as soon as the run is cancelled.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        let (done_tx, done_rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                done_tx: Mutex::new(Some(done_tx)),
                done_rx,
            }),
        }
    }

    /// Cancel the token. Idempotent.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the only sender disconnects every `done()` receiver.
        let sender = match self.inner.done_tx.lock() {
            Ok(mut locked) => locked.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(sender);
        log::debug!("cancellation requested");
    }

    /// Whether [`CancelToken::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Receiver that never yields a value and disconnects on cancellation.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done_rx
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::select;
    use std::time::Duration;

    #[test]
    fn test_new_token_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(
            token
                .done()
                .recv_timeout(Duration::from_millis(10))
                .is_err()
        );
    }

    #[test]
    fn test_cancel_visible_to_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_done_wakes_blocked_select() {
        let token = CancelToken::new();
        let (_tx, rx) = bounded::<u32>(0);
        let waiter = {
            let token = token.clone();
            std::thread::spawn(move || {
                select! {
                    recv(rx) -> _ => false,
                    recv(token.done()) -> _ => true,
                }
            })
        };
        std::thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert!(waiter.join().unwrap());
    }
}
