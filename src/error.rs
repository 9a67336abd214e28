//! Error types used by the tickvisor runtime and its collaborators.
//!
//! - [`RuntimeError`]: failures that prevent a run from starting (always fatal).
//! - [`StoreError`]: coordination store failures.
//! - [`LaunchError`]: a worker could not be spawned or located.
//! - [`LinkError`]: a notification could not be delivered to a worker.
//! - [`ClockError`]: the clock source could not be armed.
//! - [`AgentError`]: worker-side protocol failures.
//!
//! Conditions that end a run *after* startup (overrun, worker death, operator
//! interrupt) are not errors: they are [`ExitReason`](crate::ExitReason)s
//! produced by teardown.
//!
//! All enums provide `as_label` for logs/metrics.

use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use thiserror::Error;

/// Exit code used when the run never got past startup.
pub const EXIT_STARTUP_FAILED: i32 = 1;

/// # Errors produced by the scheduler runtime.
///
/// Every variant is startup-fatal: the scheduler tears down whatever it
/// already launched and returns the error.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration rejected before anything was started.
    #[error("invalid config: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The same worker name was registered twice.
    #[error("worker {name:?} registered more than once")]
    DuplicateWorker {
        /// Offending worker name.
        name: String,
    },

    /// Coordination store unavailable or rejected a startup operation.
    #[error("coordination store: {0}")]
    Store(#[from] StoreError),

    /// A worker could not be spawned or located.
    #[error("launch of worker {worker:?} failed: {source}")]
    Launch {
        /// Worker name.
        worker: String,
        /// Underlying launch failure.
        #[source]
        source: LaunchError,
    },

    /// The notification channel to workers could not be prepared or used.
    #[error("worker link: {0}")]
    Link(#[from] LinkError),

    /// The clock could not be armed.
    #[error("clock: {0}")]
    Clock(#[from] ClockError),

    /// OS signal listeners could not be installed.
    #[error("signal listener install failed: {0}")]
    SignalInstall(#[source] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use tickvisor::RuntimeError;
    ///
    /// let err = RuntimeError::DuplicateWorker { name: "timer".into() };
    /// assert_eq!(err.as_label(), "runtime_duplicate_worker");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::InvalidConfig { .. } => "runtime_invalid_config",
            RuntimeError::DuplicateWorker { .. } => "runtime_duplicate_worker",
            RuntimeError::Store(_) => "runtime_store",
            RuntimeError::Launch { .. } => "runtime_launch",
            RuntimeError::Link(_) => "runtime_link",
            RuntimeError::Clock(_) => "runtime_clock",
            RuntimeError::SignalInstall(_) => "runtime_signal_install",
        }
    }
}

/// # Errors produced by a [`CoordinationStore`](crate::CoordinationStore).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying I/O failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Another scheduler already owns this store.
    #[error("store already owned (lock {path})")]
    Locked {
        /// Path of the existing lock.
        path: String,
    },

    /// A stored value could not be interpreted.
    #[error("malformed value for {key:?}: {value:?}")]
    Malformed {
        /// Key that was read.
        key: String,
        /// Raw value found.
        value: String,
    },

    /// Worker name cannot be used as a store key.
    #[error("invalid worker name {0:?}")]
    InvalidName(String),
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Io(_) => "store_io",
            StoreError::Locked { .. } => "store_locked",
            StoreError::Malformed { .. } => "store_malformed",
            StoreError::InvalidName(_) => "store_invalid_name",
        }
    }
}

/// # Errors produced while spawning or locating a worker process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The worker executable could not be started.
    #[error("spawn {program:?}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// OS error.
        #[source]
        source: std::io::Error,
    },

    /// The process table could not be scanned while attaching.
    #[error("process scan: {0}")]
    Scan(#[source] std::io::Error),

    /// The spawned process reported an id that does not fit a pid.
    #[error("pid {0} out of range")]
    PidRange(u32),
}

impl LaunchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LaunchError::Spawn { .. } => "launch_spawn",
            LaunchError::Scan(_) => "launch_scan",
            LaunchError::PidRange(_) => "launch_pid_range",
        }
    }
}

/// # Errors produced while notifying workers.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LinkError {
    /// Target process no longer exists.
    #[error("process {pid} is gone")]
    Gone {
        /// Raw pid.
        pid: i32,
    },

    /// Signal delivery failed for another reason.
    #[error("send {signal} to {pid}: {source}")]
    Signal {
        /// Signal being sent.
        signal: Signal,
        /// Raw pid.
        pid: i32,
        /// OS errno.
        #[source]
        source: Errno,
    },

    /// Listener for inbound notifications could not be installed.
    #[error("listener install failed: {0}")]
    Listen(#[source] std::io::Error),

    /// `wait_ready` was called before `prepare`.
    #[error("link not prepared")]
    NotPrepared,
}

impl LinkError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LinkError::Gone { .. } => "link_gone",
            LinkError::Signal { .. } => "link_signal",
            LinkError::Listen(_) => "link_listen",
            LinkError::NotPrepared => "link_not_prepared",
        }
    }

    /// True when the target process does not exist anymore.
    pub fn is_gone(&self) -> bool {
        matches!(self, LinkError::Gone { .. })
    }
}

/// # Errors produced by a [`Clock`](crate::Clock).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ClockError {
    /// Period must be non-zero.
    #[error("period must be non-zero")]
    ZeroPeriod,

    /// Clock is already running.
    #[error("clock already armed with period {period:?}")]
    AlreadyArmed {
        /// Period currently armed.
        period: Duration,
    },

    /// The kernel timer could not be created or set.
    #[error("interval timer unavailable: {0}")]
    Timer(#[from] std::io::Error),
}

impl ClockError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ClockError::ZeroPeriod => "clock_zero_period",
            ClockError::AlreadyArmed { .. } => "clock_already_armed",
            ClockError::Timer(_) => "clock_timer",
        }
    }
}

/// # Errors produced by the worker-side [`WorkerAgent`](crate::WorkerAgent).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AgentError {
    /// The agent was not started by a scheduler (missing environment).
    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    /// Signal delivery or listener install failed.
    #[error("link: {0}")]
    Link(#[from] LinkError),

    /// The worker's completion flag could not be written.
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

impl AgentError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            AgentError::MissingEnv(_) => "agent_missing_env",
            AgentError::Link(_) => "agent_link",
            AgentError::Store(_) => "agent_store",
        }
    }
}
