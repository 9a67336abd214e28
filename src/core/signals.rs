//! # Pending notification counters.
//!
//! One atomic counter per notification kind the scheduler reacts to, plus a
//! [`Notify`] used to wake the scheduler loop.
//!
//! ```text
//!  delivery (OS listener, clock task)        scheduler loop
//!  ──────────────────────────────────        ──────────────
//!  raise(kind) ─► counter += 1               wait() ─► any() ?
//!              └► notify_one()                  └─► drain / consume by priority
//! ```
//!
//! ## Rules
//! - Delivery only increments and notifies. All real work happens in the loop.
//! - Counters never go below zero (`consume` saturates).
//! - A clock counter of 2 or more when a tick is about to be handled is an overrun.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Notify;

/// Notification kinds, listed in dispatch priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Operator asked the run to stop.
    Interrupt,
    /// One or more child processes terminated.
    ChildDied,
    /// One clock period elapsed.
    ClockFired,
}

impl SignalKind {
    /// All kinds in dispatch priority order.
    pub const PRIORITY: [SignalKind; 3] = [
        SignalKind::Interrupt,
        SignalKind::ChildDied,
        SignalKind::ClockFired,
    ];
}

/// Process-wide pending counters shared between delivery and the scheduler loop.
#[derive(Debug, Default)]
pub struct PendingSignals {
    interrupt: AtomicU64,
    child: AtomicU64,
    clock: AtomicU64,
    notify: Notify,
}

impl PendingSignals {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, kind: SignalKind) -> &AtomicU64 {
        match kind {
            SignalKind::Interrupt => &self.interrupt,
            SignalKind::ChildDied => &self.child,
            SignalKind::ClockFired => &self.clock,
        }
    }

    /// Records one notification and wakes the loop.
    ///
    /// This is the only operation delivery code performs.
    #[inline]
    pub fn raise(&self, kind: SignalKind) {
        self.counter(kind).fetch_add(1, Ordering::AcqRel);
        self.notify.notify_one();
    }

    /// Current value of a counter.
    #[inline]
    pub fn count(&self, kind: SignalKind) -> u64 {
        self.counter(kind).load(Ordering::Acquire)
    }

    /// Decrements a counter by one; returns `false` if it was already zero.
    pub fn consume(&self, kind: SignalKind) -> bool {
        self.counter(kind)
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Resets a counter to zero and returns the drained amount.
    pub fn drain(&self, kind: SignalKind) -> u64 {
        self.counter(kind).swap(0, Ordering::AcqRel)
    }

    /// True if any counter is non-zero.
    pub fn any(&self) -> bool {
        SignalKind::PRIORITY.iter().any(|k| self.count(*k) > 0)
    }

    /// Highest-priority kind with a non-zero counter.
    pub fn next(&self) -> Option<SignalKind> {
        SignalKind::PRIORITY
            .into_iter()
            .find(|k| self.count(*k) > 0)
    }

    /// Suspends until at least one counter is non-zero.
    ///
    /// A `raise` racing the check leaves a stored permit in the [`Notify`],
    /// so no notification is lost.
    pub async fn wait(&self) {
        loop {
            if self.any() {
                return;
            }
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn consume_saturates_at_zero() {
        let p = PendingSignals::new();
        assert!(!p.consume(SignalKind::ClockFired));
        p.raise(SignalKind::ClockFired);
        p.raise(SignalKind::ClockFired);
        assert_eq!(p.count(SignalKind::ClockFired), 2);
        assert!(p.consume(SignalKind::ClockFired));
        assert!(p.consume(SignalKind::ClockFired));
        assert!(!p.consume(SignalKind::ClockFired));
        assert_eq!(p.count(SignalKind::ClockFired), 0);
    }

    #[test]
    fn next_follows_priority_order() {
        let p = PendingSignals::new();
        assert_eq!(p.next(), None);
        p.raise(SignalKind::ClockFired);
        assert_eq!(p.next(), Some(SignalKind::ClockFired));
        p.raise(SignalKind::ChildDied);
        assert_eq!(p.next(), Some(SignalKind::ChildDied));
        p.raise(SignalKind::Interrupt);
        assert_eq!(p.next(), Some(SignalKind::Interrupt));

        assert_eq!(p.drain(SignalKind::Interrupt), 1);
        assert_eq!(p.next(), Some(SignalKind::ChildDied));
    }

    #[tokio::test]
    async fn wait_returns_once_raised_from_another_task() {
        let p = Arc::new(PendingSignals::new());
        let raiser = Arc::clone(&p);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            raiser.raise(SignalKind::ChildDied);
        });

        tokio::time::timeout(Duration::from_secs(2), p.wait())
            .await
            .expect("wait should complete");
        assert_eq!(p.count(SignalKind::ChildDied), 1);
    }

    #[tokio::test]
    async fn wait_does_not_lose_a_raise_before_the_call() {
        let p = PendingSignals::new();
        p.raise(SignalKind::Interrupt);
        p.wait().await;
        assert_eq!(p.drain(SignalKind::Interrupt), 1);
    }
}
