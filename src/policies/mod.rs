//! Supervision policies.
//!
//! ## Contents
//! - [`ViolationPolicy`] whether repeated deadline misses ever end a run
//!
//! ## Quick wiring
//! ```text
//! Config { violations: ViolationPolicy, .. }
//!      └─► Scheduler clock handler:
//!           - busy flag → WorkerRecord::record_violation() → consecutive misses
//!           - violations.escalates(consecutive) → teardown(WorkerStalled)
//! ```

mod violation;

pub use violation::ViolationPolicy;
