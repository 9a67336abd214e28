//! # Launching worker processes.
//!
//! [`Launcher`] turns a [`WorkerSpec`] into a [`ProcessHandle`]. The default
//! [`ProcessLauncher`] either spawns the program as a child or polls the
//! process table until a process with the worker's command name shows up.
//!
//! Spawned children inherit two variables so they can find their place in
//! the protocol without extra arguments:
//! - [`ENV_WORKER_NAME`] their worker name (also their flag key);
//! - [`ENV_SUPERVISOR_PID`] pid of the scheduler that expects their readiness.

use std::io;
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use nix::unistd::Pid;
use tracing::debug;

use super::handle::ProcessHandle;
use super::spec::{Launch, WorkerSpec};
use crate::error::LaunchError;

/// Environment variable carrying the worker name into a spawned worker.
pub const ENV_WORKER_NAME: &str = "TICKVISOR_WORKER";

/// Environment variable carrying the scheduler pid into a spawned worker.
pub const ENV_SUPERVISOR_PID: &str = "TICKVISOR_SUPERVISOR_PID";

/// Longest command name the kernel keeps for a process (`TASK_COMM_LEN - 1`).
const COMM_LEN: usize = 15;

/// Produces the OS process of a worker.
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// Spawns or locates the process described by `spec`.
    ///
    /// Attaching may wait indefinitely for the process to appear; the
    /// scheduler races this call against interrupts.
    async fn launch(&self, spec: &WorkerSpec) -> Result<ProcessHandle, LaunchError>;
}

/// Launcher backed by real OS processes.
#[derive(Clone, Debug)]
pub struct ProcessLauncher {
    attach_poll: Duration,
    envs: Vec<(String, String)>,
}

impl ProcessLauncher {
    /// Creates a launcher that rescans the process table every `attach_poll`
    /// while waiting for an attached worker.
    pub fn new(attach_poll: Duration) -> Self {
        Self {
            attach_poll,
            envs: Vec::new(),
        }
    }

    /// Adds an environment variable passed to every spawned worker.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    fn spawn(&self, name: &str, program: &str, args: &[String]) -> Result<ProcessHandle, LaunchError> {
        let child = Command::new(program)
            .args(args)
            .env(ENV_WORKER_NAME, name)
            .env(ENV_SUPERVISOR_PID, std::process::id().to_string())
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: program.to_string(),
                source,
            })?;

        // The child is reaped through waitpid by the link, not through `Child`.
        let raw = child.id();
        drop(child);
        let pid = i32::try_from(raw).map_err(|_| LaunchError::PidRange(raw))?;
        Ok(ProcessHandle::spawned(Pid::from_raw(pid)))
    }

    async fn locate(&self, name: &str) -> Result<ProcessHandle, LaunchError> {
        let comm = comm_name(name).to_string();
        loop {
            let wanted = comm.clone();
            let found = tokio::task::spawn_blocking(move || find_by_comm(&wanted))
                .await
                .map_err(|e| LaunchError::Scan(io::Error::other(e)))??;
            if let Some(pid) = found {
                return Ok(ProcessHandle::attached(pid));
            }
            debug!(worker = name, poll = ?self.attach_poll, "waiting for worker process to appear");
            tokio::time::sleep(self.attach_poll).await;
        }
    }
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, spec: &WorkerSpec) -> Result<ProcessHandle, LaunchError> {
        match spec.launch() {
            Launch::Spawn { program, args } => self.spawn(spec.name(), program, args),
            Launch::Attach => self.locate(spec.name()).await,
        }
    }
}

/// Name as the kernel reports it in `/proc/<pid>/comm`.
fn comm_name(name: &str) -> &str {
    if name.len() <= COMM_LEN {
        return name;
    }
    let mut end = COMM_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Lowest pid (other than our own) whose command name is `comm`.
fn find_by_comm(comm: &str) -> Result<Option<Pid>, LaunchError> {
    let own = std::process::id();
    let mut best: Option<u32> = None;

    for entry in std::fs::read_dir("/proc").map_err(LaunchError::Scan)? {
        let Ok(entry) = entry else { continue };
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|s| s.parse::<u32>().ok())
        else {
            continue;
        };
        if pid == own {
            continue;
        }
        // Processes may exit between listing and reading.
        let Ok(found) = std::fs::read_to_string(entry.path().join("comm")) else {
            continue;
        };
        if found.trim_end_matches('\n') == comm && best.is_none_or(|b| pid < b) {
            best = Some(pid);
        }
    }

    match best {
        Some(pid) => {
            let raw = i32::try_from(pid).map_err(|_| LaunchError::PidRange(pid))?;
            Ok(Some(Pid::from_raw(raw)))
        }
        None => Ok(None),
    }
}
