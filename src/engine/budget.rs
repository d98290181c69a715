//! Cumulative runtime ceiling for one configuration

use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use super::Clock;
use crate::controller::MaxRuntimeExceeded;

/// Tracks fit time spent on one configuration against a ceiling.
///
/// The executor opens and closes a timing window around every timed fit.
/// Adapters may call [`RuntimeBudget::check`] from inside `fit` to stop
/// early; the executor also checks between iterations.
pub struct RuntimeBudget {
    clock: Arc<dyn Clock>,
    limit: Duration,
    spent: Cell<Duration>,
    window_start: Cell<Option<Duration>>,
}

impl RuntimeBudget {
    /// Budget of `limit` measured with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, limit: Duration) -> Self {
        Self {
            clock,
            limit,
            spent: Cell::new(Duration::ZERO),
            window_start: Cell::new(None),
        }
    }

    /// Get the ceiling.
    #[must_use]
    pub const fn limit(&self) -> Duration {
        self.limit
    }

    /// Open a timing window.
    pub fn start(&self) {
        self.window_start.set(Some(self.clock.now()));
    }

    /// Close the timing window and return its length.
    pub fn stop(&self) -> Duration {
        let Some(started) = self.window_start.take() else {
            return Duration::ZERO;
        };
        let window = self.clock.now().saturating_sub(started);
        self.spent.set(self.spent.get() + window);
        window
    }

    /// Fit time spent so far, including an open window.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        let open = self
            .window_start
            .get()
            .map_or(Duration::ZERO, |started| self.clock.now().saturating_sub(started));
        self.spent.get() + open
    }

    /// Whether the ceiling has been passed.
    #[must_use]
    pub fn exceeded(&self) -> bool {
        self.elapsed() > self.limit
    }

    /// Fail once the ceiling has been passed.
    ///
    /// # Errors
    ///
    /// Returns [`MaxRuntimeExceeded`] when elapsed time is over the limit.
    pub fn check(&self) -> Result<(), MaxRuntimeExceeded> {
        if self.exceeded() {
            return Err(MaxRuntimeExceeded {
                limit_secs: self.limit.as_secs_f64(),
                elapsed_secs: self.elapsed().as_secs_f64(),
            });
        }
        Ok(())
    }
}
