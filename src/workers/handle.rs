//! Process handles and reaped exit statuses.

use std::fmt;

use nix::sys::signal::Signal;
use nix::unistd::Pid;

/// Where a worker process came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Child of the scheduler; reaped by it and expected to announce readiness.
    Spawned,
    /// Located by name; already initialized, not our child.
    Attached,
}

/// OS process of a supervised worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessHandle {
    pid: Pid,
    origin: Origin,
}

impl ProcessHandle {
    /// Handle for a process the scheduler spawned.
    pub fn spawned(pid: Pid) -> Self {
        Self {
            pid,
            origin: Origin::Spawned,
        }
    }

    /// Handle for a process located by name.
    pub fn attached(pid: Pid) -> Self {
        Self {
            pid,
            origin: Origin::Attached,
        }
    }

    /// Process id.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Raw process id, for logs and events.
    pub fn raw(&self) -> i32 {
        self.pid.as_raw()
    }

    /// How the process was obtained.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// True if the scheduler is the parent of this process.
    pub fn is_owned(&self) -> bool {
        self.origin == Origin::Spawned
    }
}

/// How a reaped child ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    /// Normal exit with a code.
    Exited(i32),
    /// Killed by a signal.
    Signaled(Signal),
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exited({code})"),
            ExitStatus::Signaled(sig) => write!(f, "signaled({sig})"),
        }
    }
}

/// One child collected by a non-blocking reap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reaped {
    /// Pid of the terminated child.
    pub pid: Pid,
    /// How it ended.
    pub status: ExitStatus,
}
