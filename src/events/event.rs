//! # Runtime events emitted by the scheduler.
//!
//! The [`EventKind`] enum classifies event types across four groups:
//! - **Startup events**: worker launch, attach, readiness, clock armed
//! - **Tick events**: tick publication, timing violations, probe/wake failures
//! - **Fatal causes**: shutdown request, worker death, overrun, stall, lost tick
//! - **Teardown events**: teardown start, clock disarmed, worker terminated, completion
//!
//! The [`Event`] struct carries metadata such as timestamps, worker name,
//! tick step, pid, and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use tickvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TimingViolation)
//!     .with_worker("decoder")
//!     .with_step(6)
//!     .with_count(1);
//!
//! assert_eq!(ev.kind, EventKind::TimingViolation);
//! assert_eq!(ev.worker.as_deref(), Some("decoder"));
//! assert_eq!(ev.step, Some(6));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Startup ===
    /// Worker process was spawned by the scheduler.
    ///
    /// Sets: `worker`, `pid`
    WorkerLaunched,

    /// Already-running worker process was located.
    ///
    /// Sets: `worker`, `pid`
    WorkerAttached,

    /// Worker announced readiness (or was attached, which implies it).
    ///
    /// Sets: `worker`, `pid`
    WorkerReady,

    /// Clock armed; the steady-state loop begins.
    ///
    /// Sets: `reason` (period)
    ClockArmed,

    // === Ticks ===
    /// Tick `step` was published to the coordination store.
    ///
    /// Sets: `step`
    TickPublished,

    /// Worker's completion flag still read "busy" when the next tick fired.
    ///
    /// Sets: `worker`, `step` (tick being handled), `count` (consecutive misses)
    TimingViolation,

    /// Completion flag could not be read; the worker is not judged this tick.
    ///
    /// Sets: `worker`, `step`, `reason`
    ProbeFailed,

    /// Wake notification could not be delivered (process still exists).
    ///
    /// Sets: `worker`, `step`, `reason`
    WakeFailed,

    // === Fatal causes ===
    /// Operator interrupt observed.
    ShutdownRequested,

    /// A supervised worker terminated.
    ///
    /// Sets: `worker`, `pid`, `reason` (exit status)
    WorkerDied,

    /// A second tick arrived before the previous one was handled.
    ///
    /// Sets: `step`, `count` (pending clock notifications)
    OverrunDetected,

    /// A worker exceeded the configured consecutive-violation threshold.
    ///
    /// Sets: `worker`, `step`, `count`
    WorkerStalled,

    /// Tick could not be published.
    ///
    /// Sets: `step`, `reason`
    TickLost,

    // === Teardown ===
    /// Teardown began.
    ///
    /// Sets: `reason` (exit reason label)
    TeardownStarted,

    /// Clock disarmed; no further ticks will be requested.
    ClockDisarmed,

    /// Termination notification sent to a worker.
    ///
    /// Sets: `worker`, `pid`, `reason` (on delivery failure)
    WorkerTerminated,

    /// Teardown finished.
    ///
    /// Sets: `exit_code`, `reason`
    TeardownComplete,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Worker name, if applicable.
    pub worker: Option<Arc<str>>,
    /// Tick step, if applicable.
    pub step: Option<u64>,
    /// OS pid of the worker, if known.
    pub pid: Option<i32>,
    /// Counter value (consecutive misses, pending ticks).
    pub count: Option<u64>,
    /// Process exit code chosen by teardown.
    pub exit_code: Option<i32>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            step: None,
            pid: None,
            count: None,
            exit_code: None,
            reason: None,
        }
    }

    /// Attaches a worker name.
    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Attaches a tick step.
    #[inline]
    pub fn with_step(mut self, step: u64) -> Self {
        self.step = Some(step);
        self
    }

    /// Attaches a pid.
    #[inline]
    pub fn with_pid(mut self, pid: i32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches a counter value.
    #[inline]
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Attaches the exit code.
    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// True for events that name the cause of a run ending.
    #[inline]
    pub fn is_fatal_cause(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ShutdownRequested
                | EventKind::WorkerDied
                | EventKind::OverrunDetected
                | EventKind::WorkerStalled
                | EventKind::TickLost
        )
    }
}
