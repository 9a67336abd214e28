//! # Teardown and exit reasons.
//!
//! Every way a run ends goes through [`Run::teardown`]:
//!
//! ```text
//! teardown(reason)
//!   ├─ already ran? → return the first reason (no side effects)
//!   ├─ TeardownStarted
//!   ├─ clock.disarm()                 → ClockDisarmed   (before anything else)
//!   ├─ terminate every live worker    → WorkerTerminated
//!   ├─ non-blocking reap              (quiet)
//!   ├─ store.release()
//!   ├─ restore scheduling policy
//!   └─ TeardownComplete { exit_code }
//! ```

use std::fmt;

use tracing::{debug, warn};

use super::scheduler::Run;
use crate::error::EXIT_STARTUP_FAILED;
use crate::events::{Event, EventKind};
use crate::store::RunStatus;

/// Why a run ended. Maps to the process exit code.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Operator interrupt. Exit code 0.
    Interrupted,
    /// The clock fired again before the previous tick was handled. Exit code 3.
    Overrun {
        /// Step that was about to be published.
        step: u64,
        /// Pending clock notifications observed.
        pending: u64,
    },
    /// A supervised worker terminated. Exit code 4.
    WorkerDied {
        /// First worker found dead.
        worker: String,
    },
    /// A worker missed too many deadlines in a row under an escalating policy. Exit code 5.
    WorkerStalled {
        /// Offending worker.
        worker: String,
        /// Consecutive misses when escalated.
        consecutive: u32,
    },
    /// A tick could not be published. Exit code 6.
    TickLost {
        /// Step that was lost.
        step: u64,
    },
    /// Startup did not complete. Exit code 1.
    StartupFailed,
}

impl ExitReason {
    /// Process exit code for this reason.
    ///
    /// # Example
    /// ```
    /// use tickvisor::ExitReason;
    ///
    /// assert_eq!(ExitReason::Interrupted.code(), 0);
    /// assert_eq!(ExitReason::WorkerDied { worker: "C".into() }.code(), 4);
    /// ```
    pub fn code(&self) -> i32 {
        match self {
            ExitReason::Interrupted => 0,
            ExitReason::StartupFailed => EXIT_STARTUP_FAILED,
            ExitReason::Overrun { .. } => 3,
            ExitReason::WorkerDied { .. } => 4,
            ExitReason::WorkerStalled { .. } => 5,
            ExitReason::TickLost { .. } => 6,
        }
    }

    /// True for the clean-shutdown reason.
    pub fn is_success(&self) -> bool {
        self.code() == 0
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExitReason::Interrupted => "interrupted",
            ExitReason::Overrun { .. } => "overrun",
            ExitReason::WorkerDied { .. } => "worker_died",
            ExitReason::WorkerStalled { .. } => "worker_stalled",
            ExitReason::TickLost { .. } => "tick_lost",
            ExitReason::StartupFailed => "startup_failed",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Interrupted => f.write_str("interrupted by operator"),
            ExitReason::Overrun { step, pending } => {
                write!(f, "overrun at step {step} ({pending} clock notifications pending)")
            }
            ExitReason::WorkerDied { worker } => write!(f, "worker {worker:?} died"),
            ExitReason::WorkerStalled {
                worker,
                consecutive,
            } => write!(f, "worker {worker:?} missed {consecutive} deadlines in a row"),
            ExitReason::TickLost { step } => write!(f, "tick {step} could not be published"),
            ExitReason::StartupFailed => f.write_str("startup failed"),
        }
    }
}

impl Run {
    /// Releases everything the run holds. Runs its side effects at most once.
    pub(super) async fn teardown(&mut self, reason: ExitReason) -> ExitReason {
        if let Some(first) = &self.exit {
            debug!(first = first.as_label(), again = reason.as_label(), "teardown already done");
            return first.clone();
        }
        self.exit = Some(reason.clone());

        self.bus.publish(
            Event::new(EventKind::TeardownStarted)
                .with_reason(reason.to_string())
                .with_step(self.step),
        );

        self.clock.disarm();
        self.bus.publish(Event::new(EventKind::ClockDisarmed));

        for rec in self.registry.iter().filter(|r| r.is_alive()) {
            let Some(handle) = rec.handle() else { continue };
            let mut ev = Event::new(EventKind::WorkerTerminated)
                .with_worker(rec.name_arc())
                .with_pid(handle.raw());
            if let Err(e) = self.link.terminate(&handle) {
                ev = ev.with_reason(e.to_string());
            }
            self.bus.publish(ev);
        }

        for reaped in self.link.reap() {
            if let Some(rec) = self.registry.by_pid_mut(reaped.pid) {
                rec.mark_dead();
            }
        }

        self.publish_status(RunStatus::Stopped {
            code: reason.code(),
            reason: reason.as_label(),
        })
        .await;
        if let Err(e) = self.store.release().await {
            warn!(error = %e, label = e.as_label(), "store release failed");
        }
        self.realtime.restore();

        self.bus.publish(
            Event::new(EventKind::TeardownComplete)
                .with_exit_code(reason.code())
                .with_reason(reason.as_label()),
        );
        reason
    }
}
