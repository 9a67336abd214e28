//! # Scheduler configuration.
//!
//! Provides [`Config`] centralized settings for a run.
//!
//! ## Sentinel values
//! - `realtime_priority = None` → keep the default OS scheduling class
//! - `violations = Report` → timing violations never end the run

use std::time::Duration;

use crate::error::RuntimeError;
use crate::policies::ViolationPolicy;

/// Highest SCHED_FIFO priority accepted by Linux.
const MAX_FIFO_PRIORITY: i32 = 99;

/// Configuration for one scheduler run.
///
/// ## Field semantics
/// - `period`: tick period (microsecond granularity; must be non-zero)
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `violations`: escalation policy for repeated deadline misses
/// - `attach_poll`: how often to rescan the process table while attaching by name
/// - `realtime_priority`: `Some(p)` runs the scheduler under SCHED_FIFO at priority `p`
#[derive(Clone, Debug)]
pub struct Config {
    /// Clock period.
    pub period: Duration,

    /// Capacity of the event bus broadcast channel.
    ///
    /// Every tick publishes at least one event; receivers lagging more than
    /// this many events skip the oldest ones.
    pub bus_capacity: usize,

    /// What to do when a worker keeps missing deadlines.
    pub violations: ViolationPolicy,

    /// Delay between process-table scans while waiting for an attached worker.
    pub attach_poll: Duration,

    /// SCHED_FIFO priority for the scheduler process (1..=99), if any.
    ///
    /// Restored to SCHED_OTHER during teardown.
    pub realtime_priority: Option<i32>,
}

impl Config {
    /// Returns a copy with the period given in microseconds.
    pub fn with_period_micros(mut self, micros: u64) -> Self {
        self.period = Duration::from_micros(micros);
        self
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Checks values that would make the run meaningless.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.period.is_zero() {
            return Err(RuntimeError::InvalidConfig {
                reason: "period must be non-zero".into(),
            });
        }
        if let Some(p) = self.realtime_priority {
            if !(1..=MAX_FIFO_PRIORITY).contains(&p) {
                return Err(RuntimeError::InvalidConfig {
                    reason: format!("realtime priority {p} outside 1..={MAX_FIFO_PRIORITY}"),
                });
            }
        }
        Ok(())
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `period = 1ms` (1 kHz)
    /// - `bus_capacity = 1024`
    /// - `violations = ViolationPolicy::Report`
    /// - `attach_poll = 1s`
    /// - `realtime_priority = None`
    fn default() -> Self {
        Self {
            period: Duration::from_millis(1),
            bus_capacity: 1024,
            violations: ViolationPolicy::default(),
            attach_poll: Duration::from_secs(1),
            realtime_priority: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.period, Duration::from_micros(1000));
    }

    #[test]
    fn rejects_zero_period_and_bad_priority() {
        let cfg = Config::default().with_period_micros(0);
        assert_eq!(cfg.validate().unwrap_err().as_label(), "runtime_invalid_config");

        let cfg = Config {
            realtime_priority: Some(120),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            realtime_priority: Some(80),
            ..Config::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn bus_capacity_is_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
