//! # Coordination store.
//!
//! The store is the only shared mutable state of a run. Ownership is
//! partitioned instead of locked:
//!
//! | Key | Writer | Reader |
//! |---|---|---|
//! | worker registry | operator / deployment | scheduler (`worker_list`) |
//! | completion flag of `name` | worker `name` only (`set_flag`) | scheduler (`probe`) |
//! | tick channel | scheduler only (`publish_tick`) | anyone |
//! | status channel | scheduler only (`publish_status`) | anyone |
//!
//! No key has two writers, so no cross-process mutex is needed.
//!
//! Implementations:
//! - [`MemoryStore`]: in-process; tests and single-process embedding.
//! - [`FsStore`]: directory-backed; survives crashes of either side and is
//!   reachable from any local process.

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::error::StoreError;

/// Per-worker "am I inside my tick's work" indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CompletionFlag {
    /// Not working on a tick (also the value of a never-written flag).
    #[default]
    Idle,
    /// Working on a tick.
    Busy,
}

impl CompletionFlag {
    /// Stored textual form.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionFlag::Idle => "idle",
            CompletionFlag::Busy => "busy",
        }
    }
}

impl fmt::Display for CompletionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletionFlag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "idle" | "0" | "" => Ok(CompletionFlag::Idle),
            "busy" | "1" => Ok(CompletionFlag::Busy),
            _ => Err(()),
        }
    }
}

/// Run-state transition written to the status channel.
///
/// A run publishes `Starting`, then `Running` once the clock is armed, then
/// exactly one `Stopped`. A failed startup goes straight to `Stopped`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Workers are being launched and waited for.
    Starting,
    /// The clock is armed; ticks are being published.
    Running,
    /// Teardown ran.
    Stopped {
        /// Process exit code of the run.
        code: i32,
        /// Short label of the exit reason (e.g. `"overrun"`).
        reason: &'static str,
    },
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Starting => f.write_str("starting"),
            RunStatus::Running => f.write_str("running"),
            RunStatus::Stopped { code, reason } => write!(f, "stopped\t{reason}\t{code}"),
        }
    }
}

/// Operations the scheduler (and the worker agent) need from the shared store.
///
/// Every operation must complete in bounded time: the scheduler calls
/// `probe` and `publish_tick` from inside its tick handler.
#[async_trait]
pub trait CoordinationStore: Send + Sync + 'static {
    /// Ordered names of the workers to supervise.
    async fn worker_list(&self) -> Result<Vec<String>, StoreError>;

    /// Non-blocking liveness probe: reads the worker's completion flag once.
    ///
    /// Never waits for the worker to change it.
    async fn probe(&self, worker: &str) -> Result<CompletionFlag, StoreError>;

    /// Writes a worker's own completion flag. Called by that worker only.
    async fn set_flag(&self, worker: &str, flag: CompletionFlag) -> Result<(), StoreError>;

    /// Appends one "tick `step` occurred" record.
    async fn publish_tick(&self, step: u64) -> Result<(), StoreError>;

    /// Appends one run-state transition to the status channel.
    async fn publish_status(&self, status: RunStatus) -> Result<(), StoreError>;

    /// Releases resources the scheduler owns in the store. Called once, at teardown.
    async fn release(&self) -> Result<(), StoreError>;
}
