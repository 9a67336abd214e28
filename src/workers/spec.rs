//! # Worker specification.
//!
//! [`WorkerSpec`] names a worker and says how its process comes to exist:
//! spawned by the scheduler, or attached to an already-running process of the
//! same name. Which one is a deployment choice; the scheduler treats both alike
//! once a [`ProcessHandle`](crate::ProcessHandle) exists.
//!
//! ## Textual form
//! ```text
//! "generator=/opt/rig/generator --channels 96"   → spawn
//! "monitor"                                      → attach
//! ```
//!
//! ## Example
//! ```rust
//! use tickvisor::{Launch, WorkerSpec};
//!
//! let spec: WorkerSpec = "generator=/opt/rig/generator --channels 96".parse().unwrap();
//! assert_eq!(spec.name(), "generator");
//! assert!(matches!(spec.launch(), Launch::Spawn { .. }));
//!
//! let attach = WorkerSpec::attach("monitor");
//! assert_eq!(attach.launch(), &Launch::Attach);
//! ```

use std::fmt;
use std::str::FromStr;

/// How a worker process is obtained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Launch {
    /// Start `program` with `args` as a child of the scheduler.
    Spawn {
        /// Executable path or name (resolved through `PATH`).
        program: String,
        /// Arguments passed verbatim.
        args: Vec<String>,
    },
    /// Locate an already-running process whose command name equals the worker name.
    Attach,
}

/// Name plus launch recipe of one supervised worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerSpec {
    name: String,
    launch: Launch,
}

impl WorkerSpec {
    /// Worker the scheduler spawns.
    pub fn spawn<I, S>(name: impl Into<String>, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            launch: Launch::Spawn {
                program: program.into(),
                args: args.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// Worker that is already running and only needs to be located.
    pub fn attach(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            launch: Launch::Attach,
        }
    }

    /// Worker name; also its completion-flag key in the store.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Launch recipe.
    pub fn launch(&self) -> &Launch {
        &self.launch
    }
}

impl fmt::Display for WorkerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.launch {
            Launch::Attach => write!(f, "{}", self.name),
            Launch::Spawn { program, args } if args.is_empty() => {
                write!(f, "{}={program}", self.name)
            }
            Launch::Spawn { program, args } => {
                write!(f, "{}={program} {}", self.name, args.join(" "))
            }
        }
    }
}

impl FromStr for WorkerSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, command) = match s.split_once('=') {
            Some((n, c)) => (n.trim(), Some(c)),
            None => (s.trim(), None),
        };
        if name.is_empty() {
            return Err(format!("missing worker name in {s:?}"));
        }
        let Some(command) = command else {
            return Ok(WorkerSpec::attach(name));
        };
        let mut words = command.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| format!("missing command for worker {name:?}"))?;
        Ok(WorkerSpec::spawn(name, program, words))
    }
}
