//! # Worker registry.
//!
//! Bookkeeping for the workers of one run, in launch order.
//!
//! ## Rules
//! - A record is created when its worker's launch begins; the handle is set
//!   once the OS process exists.
//! - Liveness moves `Alive → Dead` exactly once.
//! - Names are unique.

use std::sync::Arc;

use nix::unistd::Pid;

use crate::error::RuntimeError;
use crate::workers::ProcessHandle;

/// Whether a worker process is still considered running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Liveness {
    /// Running (or being launched).
    Alive,
    /// Exited or vanished.
    Dead,
}

/// State the scheduler keeps per supervised worker.
#[derive(Clone, Debug)]
pub struct WorkerRecord {
    name: Arc<str>,
    handle: Option<ProcessHandle>,
    liveness: Liveness,
    consecutive: u32,
    violations: u64,
}

impl WorkerRecord {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            handle: None,
            liveness: Liveness::Alive,
            consecutive: 0,
            violations: 0,
        }
    }

    /// Worker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// OS process, once launched.
    pub fn handle(&self) -> Option<ProcessHandle> {
        self.handle
    }

    /// Current liveness.
    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    /// True while the worker is considered running.
    pub fn is_alive(&self) -> bool {
        self.liveness == Liveness::Alive
    }

    /// Timing violations recorded over the run.
    pub fn violations(&self) -> u64 {
        self.violations
    }

    /// Deadline misses in a row, reset by an idle probe.
    pub fn consecutive_misses(&self) -> u32 {
        self.consecutive
    }

    /// Marks the worker dead; `true` only for the transition itself.
    pub(crate) fn mark_dead(&mut self) -> bool {
        let was_alive = self.is_alive();
        self.liveness = Liveness::Dead;
        was_alive
    }

    /// Counts a missed deadline and returns the consecutive misses.
    pub(crate) fn record_violation(&mut self) -> u32 {
        self.violations += 1;
        self.consecutive = self.consecutive.saturating_add(1);
        self.consecutive
    }

    pub(crate) fn record_idle(&mut self) {
        self.consecutive = 0;
    }
}

/// Ordered, name-unique set of [`WorkerRecord`]s.
#[derive(Default)]
pub(crate) struct WorkerRegistry {
    records: Vec<WorkerRecord>,
}

impl WorkerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a record for `name`, alive and without a process yet.
    pub(crate) fn register(&mut self, name: &str) -> Result<(), RuntimeError> {
        if self.by_name(name).is_some() {
            return Err(RuntimeError::DuplicateWorker {
                name: name.to_string(),
            });
        }
        self.records.push(WorkerRecord::new(name));
        Ok(())
    }

    pub(crate) fn set_handle(&mut self, name: &str, handle: ProcessHandle) {
        if let Some(rec) = self.records.iter_mut().find(|r| r.name() == name) {
            rec.handle = Some(handle);
        }
    }

    pub(crate) fn by_name(&self, name: &str) -> Option<&WorkerRecord> {
        self.records.iter().find(|r| r.name() == name)
    }

    pub(crate) fn by_pid_mut(&mut self, pid: Pid) -> Option<&mut WorkerRecord> {
        self.records
            .iter_mut()
            .find(|r| r.handle.is_some_and(|h| h.pid() == pid))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &WorkerRecord> {
        self.records.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut WorkerRecord> {
        self.records.iter_mut()
    }

    pub(crate) fn snapshot(&self) -> Vec<WorkerRecord> {
        self.records.clone()
    }
}
