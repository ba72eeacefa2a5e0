//! Bounds for the spinning waits.

use portable_atomic::{AtomicBool, Ordering};

/// Decides when a bounded wait gives up.
///
/// Polled once per spin iteration.
pub trait Deadline {
    /// Returns `true` once the wait should stop.
    fn expired(&mut self) -> bool;
}

impl<F: FnMut() -> bool> Deadline for F {
    fn expired(&mut self) -> bool {
        self()
    }
}

/// Gives up after a fixed number of spin iterations.
///
/// Useful on bare-metal targets without a time base.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SpinBudget(u32);

impl SpinBudget {
    /// Allows at most `iterations` polls.
    #[must_use]
    pub const fn new(iterations: u32) -> Self {
        Self(iterations)
    }

    /// Returns the number of polls left.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.0
    }
}

impl Deadline for SpinBudget {
    fn expired(&mut self) -> bool {
        match self.0.checked_sub(1) {
            Some(remaining) => {
                self.0 = remaining;
                false
            }
            None => true,
        }
    }
}

/// Lets another context abort a bounded wait.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    /// Aborts every wait using this token, until [`Self::reset()`].
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Re-arms the token.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }

    /// Returns whether [`Self::cancel()`] was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Deadline for &CancelToken {
    fn expired(&mut self) -> bool {
        self.is_cancelled()
    }
}

/// Gives up at a point in time.
///
/// Requires an `embassy-time` driver.
#[cfg(feature = "time")]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Until(pub embassy_time::Instant);

#[cfg(feature = "time")]
impl Until {
    /// Gives up once `timeout` has elapsed from now.
    #[must_use]
    pub fn after(timeout: embassy_time::Duration) -> Self {
        Self(embassy_time::Instant::now() + timeout)
    }
}

#[cfg(feature = "time")]
impl Deadline for Until {
    fn expired(&mut self) -> bool {
        embassy_time::Instant::now() >= self.0
    }
}

/// Never expires; used by the unbounded waits.
pub(crate) struct Forever;

impl Deadline for Forever {
    fn expired(&mut self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_budget_counts_down() {
        let mut budget = SpinBudget::new(2);
        assert!(!budget.expired());
        assert!(!budget.expired());
        assert!(budget.expired());
        assert!(budget.expired());
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn cancel_token() {
        let token = CancelToken::new();
        let mut deadline = &token;
        assert!(!deadline.expired());
        token.cancel();
        assert!(deadline.expired());
        token.reset();
        assert!(!deadline.expired());
    }

    #[test]
    fn closures_are_deadlines() {
        let mut polls = 0;
        let mut deadline = || {
            polls += 1;
            polls > 1
        };
        assert!(!Deadline::expired(&mut deadline));
        assert!(Deadline::expired(&mut deadline));
    }
}
