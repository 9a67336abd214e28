//! Real-time scheduling class for the scheduler process.
//!
//! Entering `SCHED_FIFO` needs privileges; failing to get it is logged and
//! the run continues under the default policy.
//!
//! On Linux the policy applies to the calling thread, which under the
//! `current_thread` runtime is the one driving the scheduler loop and the
//! clock. The raw `sched_setscheduler` call below is the crate's only
//! `unsafe`; `nix` has no wrapper for it.

use std::io;

use tracing::{info, warn};

/// Scheduling policy held for the duration of a run.
#[derive(Debug, Default)]
pub(crate) struct Realtime {
    applied: bool,
}

impl Realtime {
    /// Switches the process to `SCHED_FIFO` at `priority`, if one is given.
    pub(crate) fn enter(priority: Option<i32>) -> Self {
        let Some(priority) = priority else {
            return Self::default();
        };
        match set_policy(Policy::Fifo, priority) {
            Ok(()) => {
                info!(priority, "entered SCHED_FIFO");
                Self { applied: true }
            }
            Err(e) => {
                warn!(priority, error = %e, "SCHED_FIFO unavailable, keeping default policy");
                Self::default()
            }
        }
    }

    /// Returns to the default policy. Idempotent.
    pub(crate) fn restore(&mut self) {
        if !std::mem::take(&mut self.applied) {
            return;
        }
        if let Err(e) = set_policy(Policy::Other, 0) {
            warn!(error = %e, "failed to restore default scheduling policy");
        }
    }
}

#[derive(Clone, Copy)]
enum Policy {
    Fifo,
    Other,
}

#[cfg(target_os = "linux")]
fn set_policy(policy: Policy, priority: i32) -> io::Result<()> {
    use nix::libc;

    let policy = match policy {
        Policy::Fifo => libc::SCHED_FIFO,
        Policy::Other => libc::SCHED_OTHER,
    };
    // SAFETY: sched_param is plain old data; all-zero is a valid value.
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    param.sched_priority = priority;
    // SAFETY: pid 0 targets the calling process and `param` outlives the call.
    let rc = unsafe { libc::sched_setscheduler(0, policy, &param) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(target_os = "linux"))]
fn set_policy(_policy: Policy, _priority: i32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "scheduling policy changes are only supported on linux",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_priority_means_nothing_to_restore() {
        let mut rt = Realtime::enter(None);
        assert!(!rt.applied);
        rt.restore();
        rt.restore();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn default_policy_needs_no_privileges() {
        set_policy(Policy::Other, 0).expect("SCHED_OTHER is always permitted");
        let mut rt = Realtime { applied: true };
        rt.restore();
        assert!(!rt.applied);
    }
}
