//! # tickvisor
//!
//! **Tickvisor** drives a set of cooperating worker processes from one
//! periodic clock and supervises them while they run.
//!
//! The scheduler launches (or attaches to) every worker, waits for each to
//! report ready, then arms a clock. On every tick it checks that each worker
//! finished the previous tick's work, wakes all of them, and publishes a
//! monotonically increasing tick number to a shared coordination store.
//! Anything that breaks the timing contract is surfaced immediately:
//! a late worker is reported, a late scheduler (overrun) or a dead worker
//! ends the run through a single, idempotent teardown.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!    SIGINT/TERM/QUIT      SIGCHLD            Clock (IntervalClock | ManualClock)
//!          │                  │                     │
//!          ▼                  ▼                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  PendingSignals   interrupt: n     child: n     clock: n           │
//! │  (delivery only increments + notifies)                            │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Scheduler (single loop)                                          │
//! │  - dispatch: Interrupt > ChildDied > ClockFired                   │
//! │  - WorkerRegistry (name, pid, liveness, violations)               │
//! │  - teardown (once): disarm → terminate → reap → release           │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        │ probe flags      │ wake (SIGUSR1)   │ publish_tick  │ publish(Event)
//!        ▼                  ▼                  ▼               ▼
//!  CoordinationStore    WorkerLink       CoordinationStore    Bus ──► SubscriberSet
//!  (MemoryStore |       (SignalLink)     (tick channel)               ├─► LogWriter
//!   FsStore)                │                                         └─► custom
//!                           ▼
//!               worker processes (WorkerAgent):
//!               ready once → [wake → busy → work → idle]* → terminate
//! ```
//!
//! ### One tick
//! ```text
//! ClockFired
//!   ├─ pending clock ≥ 2 ──► OverrunDetected ──► teardown(Overrun)     exit 3
//!   ├─ probe each live worker: busy ──► TimingViolation (non-fatal)
//!   ├─ wake each live worker:  gone ──► teardown(WorkerDied)           exit 4
//!   ├─ publish_tick(step):     fail ──► teardown(TickLost)             exit 6
//!   └─ step += 1 ──► TickPublished
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                           |
//! |-------------------|-----------------------------------------------------------------|----------------------------------------------|
//! | **Scheduling**    | Startup, tick loop, priority dispatch, teardown                 | [`Scheduler`], [`SchedulerBuilder`]          |
//! | **Clock**         | Periodic notification sources                                   | [`Clock`], [`IntervalClock`], [`ManualClock`]|
//! | **Store**         | Worker registry, completion flags, tick channel                 | [`CoordinationStore`], [`FsStore`]           |
//! | **Workers**       | Launch/attach, readiness, wake, terminate, reap                 | [`Launcher`], [`WorkerLink`], [`WorkerAgent`]|
//! | **Subscriber API**| Observe every scheduler event                                   | [`Subscribe`], [`Event`]                     |
//! | **Policies**      | Escalation of repeated timing violations                        | [`ViolationPolicy`]                          |
//! | **Errors**        | Typed startup errors and exit reasons                           | [`RuntimeError`], [`ExitReason`]             |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber and enables the `tickvisor` binary.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use tickvisor::{Config, FsStore, Scheduler, WorkerSpec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(FsStore::open("/run/rig")?);
//!     let cfg = Config::default().with_period_micros(1000);
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn tickvisor::Subscribe>> = vec![Arc::new(tickvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn tickvisor::Subscribe>> = Vec::new();
//!
//!     let scheduler = Scheduler::builder(cfg, store)
//!         .with_subscribers(subs)
//!         .build();
//!
//!     let catalog = vec![WorkerSpec::spawn("generator", "/opt/rig/generator", ["--channels", "96"])];
//!     let specs = scheduler.resolve(&catalog).await?;
//!     let report = scheduler.run(specs).await?;
//!     std::process::exit(report.exit_code());
//! }
//! ```
mod agent;
mod clock;
mod core;
mod error;
mod events;
mod policies;
mod store;
mod subscribers;
mod workers;

#[cfg(test)]
mod testkit;

// ---- Public re-exports ----

pub use agent::WorkerAgent;
pub use clock::{Clock, IntervalClock, ManualClock};
pub use core::{
    Config, ExitReason, Liveness, PendingSignals, RunReport, Scheduler, SchedulerBuilder,
    SignalKind, WorkerRecord,
};
pub use error::{
    AgentError, ClockError, EXIT_STARTUP_FAILED, LaunchError, LinkError, RuntimeError, StoreError,
};
pub use events::{Bus, Event, EventKind};
pub use policies::ViolationPolicy;
pub use store::{CompletionFlag, CoordinationStore, FsStore, MemoryStore, RunStatus};
pub use subscribers::{Subscribe, SubscriberSet};
pub use workers::{
    ENV_SUPERVISOR_PID, ENV_WORKER_NAME, ExitStatus, Launch, Launcher, Origin, ProcessHandle,
    ProcessLauncher, Reaped, SignalLink, SignalMap, WorkerLink, WorkerSpec,
};

// Optional: expose the built-in tracing subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
