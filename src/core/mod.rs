//! Runtime core: scheduling loop and lifecycle.
//!
//! Public API from this module: [`Scheduler`] (built with [`SchedulerBuilder`]),
//! its [`Config`], the [`PendingSignals`] counters and the run outcome types
//! [`ExitReason`] / [`RunReport`].
//!
//! Internal modules:
//! - [`scheduler`]: startup, steady-state loop, priority dispatch, tick handler;
//! - [`teardown`]: once-only release of clock, workers and store;
//! - [`signals`]: pending counters shared with delivery;
//! - [`shutdown`]: OS signal listeners feeding the counters;
//! - [`registry`]: per-worker records;
//! - [`realtime`]: optional SCHED_FIFO for the scheduler process.

mod builder;
mod config;
mod realtime;
mod registry;
mod scheduler;
mod shutdown;
mod signals;
mod teardown;

pub use builder::SchedulerBuilder;
pub use config::Config;
pub use registry::{Liveness, WorkerRecord};
pub use scheduler::{RunReport, Scheduler};
pub use signals::{PendingSignals, SignalKind};
pub use teardown::ExitReason;
