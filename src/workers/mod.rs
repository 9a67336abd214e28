//! # Worker processes.
//!
//! - [`WorkerSpec`] / [`Launch`] describe a worker and how it is obtained.
//! - [`Launcher`] / [`ProcessLauncher`] produce its [`ProcessHandle`].
//! - [`WorkerLink`] / [`SignalLink`] carry readiness, wake-ups, termination
//!   and reaping between scheduler and worker.
//!
//! ```text
//! WorkerSpec ──► Launcher::launch ──► ProcessHandle ──► WorkerLink::{wait_ready, wake, terminate}
//!                                                       WorkerLink::reap ──► Reaped { pid, status }
//! ```

mod handle;
mod launcher;
mod link;
mod spec;

pub use handle::{ExitStatus, Origin, ProcessHandle, Reaped};
pub use launcher::{ENV_SUPERVISOR_PID, ENV_WORKER_NAME, Launcher, ProcessLauncher};
pub use link::{SignalLink, SignalMap, WorkerLink};
pub use spec::{Launch, WorkerSpec};

pub(crate) use link::{listen, send};
