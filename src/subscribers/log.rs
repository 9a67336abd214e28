//! # LogWriter: human-readable run trace
//!
//! Renders every [`Event`] through `tracing`, one line per state transition.
//!
//! ## Example output
//! ```text
//! INFO  [launched] worker="generator" pid=4211
//! INFO  [ready] worker="generator" pid=4211
//! INFO  [clock-armed] period=1ms
//! WARN  [violation] worker="decoder" step=6 consecutive=1
//! ERROR [worker-died] worker="monitor" pid=4213 status="exited(1)"
//! INFO  [teardown] reason="worker_died"
//! INFO  [terminated] worker="generator" pid=4211
//! INFO  [teardown-complete] exit_code=4
//! ```

use async_trait::async_trait;
use tracing::{error, info, trace, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let worker = e.worker.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::WorkerLaunched => {
                info!("[launched] worker={worker:?} pid={:?}", e.pid);
            }
            EventKind::WorkerAttached => {
                info!("[attached] worker={worker:?} pid={:?}", e.pid);
            }
            EventKind::WorkerReady => {
                info!("[ready] worker={worker:?} pid={:?}", e.pid);
            }
            EventKind::ClockArmed => {
                info!("[clock-armed] period={reason}");
            }
            EventKind::TickPublished => {
                trace!("[tick] step={:?}", e.step);
            }
            EventKind::TimingViolation => {
                warn!(
                    "[violation] worker={worker:?} step={:?} consecutive={:?}",
                    e.step, e.count
                );
            }
            EventKind::ProbeFailed => {
                warn!("[probe-failed] worker={worker:?} step={:?} err={reason:?}", e.step);
            }
            EventKind::WakeFailed => {
                warn!("[wake-failed] worker={worker:?} step={:?} err={reason:?}", e.step);
            }
            EventKind::ShutdownRequested => {
                info!("[shutdown-requested]");
            }
            EventKind::WorkerDied => {
                error!("[worker-died] worker={worker:?} pid={:?} status={reason:?}", e.pid);
            }
            EventKind::OverrunDetected => {
                error!("[overrun] step={:?} pending_ticks={:?}", e.step, e.count);
            }
            EventKind::WorkerStalled => {
                error!(
                    "[stalled] worker={worker:?} step={:?} consecutive={:?}",
                    e.step, e.count
                );
            }
            EventKind::TickLost => {
                error!("[tick-lost] step={:?} err={reason:?}", e.step);
            }
            EventKind::TeardownStarted => {
                info!("[teardown] reason={reason:?}");
            }
            EventKind::ClockDisarmed => {
                info!("[clock-disarmed]");
            }
            EventKind::WorkerTerminated => match e.reason.as_deref() {
                None => info!("[terminated] worker={worker:?} pid={:?}", e.pid),
                Some(err) => warn!("[terminate-failed] worker={worker:?} pid={:?} err={err:?}", e.pid),
            },
            EventKind::TeardownComplete => {
                info!("[teardown-complete] exit_code={:?} reason={reason:?}", e.exit_code);
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }

    fn queue_capacity(&self) -> usize {
        4096
    }
}
