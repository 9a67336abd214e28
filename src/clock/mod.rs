//! # Clock sources.
//!
//! A [`Clock`] produces one `ClockFired` notification per period once armed,
//! until disarmed. It never runs scheduler logic itself: firing only raises
//! the pending counter and wakes the loop.
//!
//! - [`IntervalClock`]: kernel interval timer (`timerfd` on Linux) read
//!   through the runtime; every elapsed period is raised, so a late
//!   scheduler observes the overrun.
//! - [`ManualClock`]: fires only when told to; for tests and simulations.
//!
//! ## Lifecycle
//! ```text
//! startup ok ──► arm(period) ──► fire, fire, fire ... ──► disarm() (first teardown step)
//! ```

mod interval;
mod manual;

pub use interval::IntervalClock;
pub use manual::ManualClock;

use std::sync::Arc;
use std::time::Duration;

use crate::core::PendingSignals;
use crate::error::ClockError;

/// Periodic tick source owned by the scheduler.
pub trait Clock: Send + Sync + 'static {
    /// Starts firing every `period` into `pending`.
    ///
    /// Must be called from within a tokio runtime.
    fn arm(&mut self, period: Duration, pending: Arc<PendingSignals>) -> Result<(), ClockError>;

    /// Stops firing. Idempotent.
    fn disarm(&mut self);

    /// True between a successful `arm` and the next `disarm`.
    fn is_armed(&self) -> bool;
}
