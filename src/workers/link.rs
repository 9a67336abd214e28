//! # Notification channel between scheduler and workers.
//!
//! [`WorkerLink`] is everything the scheduler needs to talk to a worker
//! process that is not the shared store: readiness, wake-ups, termination
//! and reaping. [`SignalLink`] implements it with POSIX signals.
//!
//! ## Signal protocol
//! ```text
//! scheduler                           worker
//!    │ spawn ───────────────────────────► │ init
//!    │ ◄──────────────────────── ready ── │ (SIGUSR2 to parent, once)
//!    │ wake ────────────────────────────► │ (SIGUSR1 per tick)
//!    │ terminate ───────────────────────► │ (SIGINT at teardown)
//!    │ ◄────────────────────────── exit ──│ (SIGCHLD, reaped with waitpid)
//! ```
//!
//! Readiness signals carry no sender identity: the scheduler waits for one
//! worker at a time, so a readiness signal is attributed to the worker it is
//! currently waiting for.

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use tokio::signal::unix::{self, SignalKind};
use tokio::sync::Mutex;

use super::handle::{ExitStatus, ProcessHandle, Reaped};
use crate::error::LinkError;

/// Which signal carries which notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignalMap {
    /// Scheduler → worker: a tick occurred.
    pub wake: Signal,
    /// Worker → scheduler: initialization finished.
    pub ready: Signal,
    /// Scheduler → worker: stop.
    pub terminate: Signal,
}

impl Default for SignalMap {
    fn default() -> Self {
        Self {
            wake: Signal::SIGUSR1,
            ready: Signal::SIGUSR2,
            terminate: Signal::SIGINT,
        }
    }
}

/// Scheduler side of the worker notification channel.
#[async_trait]
pub trait WorkerLink: Send + Sync + 'static {
    /// Installs inbound listeners. Called once, before the first launch.
    async fn prepare(&self) -> Result<(), LinkError> {
        Ok(())
    }

    /// Waits until `worker` reports it finished initializing.
    async fn wait_ready(&self, worker: &ProcessHandle) -> Result<(), LinkError>;

    /// Sends the per-tick wake notification. Must not block.
    fn wake(&self, worker: &ProcessHandle) -> Result<(), LinkError>;

    /// Sends the termination request. Must not block.
    fn terminate(&self, worker: &ProcessHandle) -> Result<(), LinkError>;

    /// Collects every child that has terminated, without blocking.
    fn reap(&self) -> Vec<Reaped>;
}

/// [`WorkerLink`] over POSIX signals.
pub struct SignalLink {
    map: SignalMap,
    ready: Mutex<Option<unix::Signal>>,
}

impl SignalLink {
    /// Creates a link using `map`.
    pub fn new(map: SignalMap) -> Self {
        Self {
            map,
            ready: Mutex::new(None),
        }
    }

    /// Signal assignment in use.
    pub fn map(&self) -> SignalMap {
        self.map
    }
}

impl Default for SignalLink {
    fn default() -> Self {
        Self::new(SignalMap::default())
    }
}

/// Sends `signal` to `pid`, telling a vanished process apart from other failures.
pub(crate) fn send(pid: Pid, signal: Signal) -> Result<(), LinkError> {
    kill(pid, signal).map_err(|source| match source {
        Errno::ESRCH => LinkError::Gone { pid: pid.as_raw() },
        source => LinkError::Signal {
            signal,
            pid: pid.as_raw(),
            source,
        },
    })
}

/// Tokio listener for an arbitrary nix signal.
pub(crate) fn listen(signal: Signal) -> Result<unix::Signal, LinkError> {
    unix::signal(SignalKind::from_raw(signal as i32)).map_err(LinkError::Listen)
}

#[async_trait]
impl WorkerLink for SignalLink {
    async fn prepare(&self) -> Result<(), LinkError> {
        let mut guard = self.ready.lock().await;
        if guard.is_none() {
            *guard = Some(listen(self.map.ready)?);
        }
        Ok(())
    }

    async fn wait_ready(&self, _worker: &ProcessHandle) -> Result<(), LinkError> {
        let mut guard = self.ready.lock().await;
        let listener = guard.as_mut().ok_or(LinkError::NotPrepared)?;
        match listener.recv().await {
            Some(()) => Ok(()),
            None => Err(LinkError::Listen(std::io::Error::other(
                "readiness listener closed",
            ))),
        }
    }

    fn wake(&self, worker: &ProcessHandle) -> Result<(), LinkError> {
        send(worker.pid(), self.map.wake)
    }

    fn terminate(&self, worker: &ProcessHandle) -> Result<(), LinkError> {
        send(worker.pid(), self.map.terminate)
    }

    fn reap(&self) -> Vec<Reaped> {
        let mut out = Vec::new();
        loop {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(pid, code)) => out.push(Reaped {
                    pid,
                    status: ExitStatus::Exited(code),
                }),
                Ok(WaitStatus::Signaled(pid, sig, _)) => out.push(Reaped {
                    pid,
                    status: ExitStatus::Signaled(sig),
                }),
                Ok(WaitStatus::StillAlive) => break,
                Ok(_) => continue,
                Err(Errno::EINTR) => continue,
                // ECHILD: nothing left to wait for.
                Err(_) => break,
            }
        }
        out
    }
}
