//! Hand-driven clock.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::Clock;
use crate::core::{PendingSignals, SignalKind};
use crate::error::ClockError;

#[derive(Default)]
struct State {
    armed: Option<(Duration, Arc<PendingSignals>)>,
    arms: usize,
    disarms: usize,
}

/// Clock that fires only when [`ManualClock::fire`] is called.
///
/// Clones share state: keep one clone to drive the clock while the scheduler
/// owns the other.
#[derive(Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<State>>,
}

impl ManualClock {
    /// Creates a disarmed clock.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Delivers one tick; returns `false` (and does nothing) when disarmed.
    pub fn fire(&self) -> bool {
        match &self.state().armed {
            Some((_, pending)) => {
                pending.raise(SignalKind::ClockFired);
                true
            }
            None => false,
        }
    }

    /// Period passed to the last successful `arm`, while armed.
    pub fn period(&self) -> Option<Duration> {
        self.state().armed.as_ref().map(|(p, _)| *p)
    }

    /// Number of successful `arm` calls.
    pub fn arms(&self) -> usize {
        self.state().arms
    }

    /// Number of `disarm` calls that actually stopped an armed clock.
    pub fn disarms(&self) -> usize {
        self.state().disarms
    }
}

impl Clock for ManualClock {
    fn arm(&mut self, period: Duration, pending: Arc<PendingSignals>) -> Result<(), ClockError> {
        if period.is_zero() {
            return Err(ClockError::ZeroPeriod);
        }
        let mut st = self.state();
        if let Some((period, _)) = &st.armed {
            return Err(ClockError::AlreadyArmed { period: *period });
        }
        st.armed = Some((period, pending));
        st.arms += 1;
        Ok(())
    }

    fn disarm(&mut self) {
        let mut st = self.state();
        if st.armed.take().is_some() {
            st.disarms += 1;
        }
    }

    fn is_armed(&self) -> bool {
        self.state().armed.is_some()
    }
}
