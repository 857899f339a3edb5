//! Debouncing for inputs that change faster than they should be applied.

use std::time::Duration;

use tokio::time::Instant;

/// How long search input must stay unchanged before it is applied.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Holds the latest value of a noisy input until it has been stable for a
/// quiescence window.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    /// Create a debouncer that waits `delay` after the last push.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Record a new value and restart the quiescence window.
    pub fn push(&mut self, value: T) {
        self.pending = Some((value, Instant::now() + self.delay));
    }

    /// Drop the pending value, if any.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Whether a value is waiting to settle.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Wait until the pending value has been stable for the full window and
    /// return it.
    ///
    /// Never resolves while nothing is pending, which makes it safe to use as
    /// a branch of `tokio::select!`. Cancelling the future keeps the pending
    /// value.
    pub async fn settled(&mut self) -> T {
        let Some(deadline) = self.pending.as_ref().map(|(_, deadline)| *deadline) else {
            return std::future::pending().await;
        };

        tokio::time::sleep_until(deadline).await;

        match self.pending.take() {
            Some((value, _)) => value,
            None => std::future::pending().await,
        }
    }
}
