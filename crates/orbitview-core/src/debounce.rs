//! Trailing debounce for rapid form edits.
//!
//! Every write replaces the pending value and restarts the window. A value is
//! released only after the window has elapsed with no further writes, so a
//! burst of edits collapses into its last write. The caller supplies `now`,
//! which keeps the type free of timers and trivially testable.

use std::time::{Duration, Instant};

pub const DEFAULT_WINDOW: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
struct Pending<T> {
    value: T,
    last_write: Instant,
}

#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<Pending<T>>,
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns `true` when an earlier pending value was superseded.
    pub fn write(&mut self, value: T, now: Instant) -> bool {
        self.pending
            .replace(Pending {
                value,
                last_write: now,
            })
            .is_some()
    }

    /// Release the pending value once the window has passed quietly.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let ready = self
            .pending
            .as_ref()
            .is_some_and(|p| now.saturating_duration_since(p.last_write) >= self.window);
        if ready {
            self.pending.take().map(|p| p.value)
        } else {
            None
        }
    }

    /// Release the pending value immediately.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|p| p.value)
    }

    /// Latest unreleased value.
    pub fn peek(&self) -> Option<&T> {
        self.pending.as_ref().map(|p| &p.value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop any pending value without releasing it.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
