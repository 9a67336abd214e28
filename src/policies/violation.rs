//! # Timing-violation policy.
//!
//! [`ViolationPolicy`] decides whether a worker that keeps missing its
//! deadline ever ends the run.
//!
//! A worker that never clears its completion flag, or clears it and then
//! hangs without dying, looks exactly like a slow worker. By default this is
//! reported on every tick and never escalates.
//!
//! ```text
//! ViolationPolicy::Report            → report each miss, keep running (default)
//! ViolationPolicy::EscalateAfter(n)  → n consecutive misses by one worker
//!                                      → teardown with ExitReason::WorkerStalled
//! ```
//!
//! A tick where the worker's flag reads "idle" resets its consecutive count.

use std::num::NonZeroU32;

/// Policy controlling escalation of repeated timing violations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViolationPolicy {
    /// Report every violation; never end the run because of them (default).
    #[default]
    Report,
    /// End the run once one worker accumulates this many consecutive violations.
    EscalateAfter(NonZeroU32),
}

impl ViolationPolicy {
    /// Builds an escalating policy; `0` means [`ViolationPolicy::Report`].
    pub fn escalate_after(limit: u32) -> Self {
        match NonZeroU32::new(limit) {
            Some(n) => ViolationPolicy::EscalateAfter(n),
            None => ViolationPolicy::Report,
        }
    }

    /// True if a worker with `consecutive` misses must end the run.
    #[inline]
    pub fn escalates(&self, consecutive: u32) -> bool {
        match self {
            ViolationPolicy::Report => false,
            ViolationPolicy::EscalateAfter(limit) => consecutive >= limit.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_never_escalates() {
        let policy = ViolationPolicy::default();
        assert_eq!(policy, ViolationPolicy::Report);
        assert!(!policy.escalates(1));
        assert!(!policy.escalates(u32::MAX));
    }

    #[test]
    fn escalates_at_threshold() {
        let policy = ViolationPolicy::escalate_after(3);
        assert!(!policy.escalates(0));
        assert!(!policy.escalates(2));
        assert!(policy.escalates(3));
        assert!(policy.escalates(4));
    }

    #[test]
    fn zero_limit_means_report() {
        assert_eq!(ViolationPolicy::escalate_after(0), ViolationPolicy::Report);
    }
}
