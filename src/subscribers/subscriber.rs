//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for observing the scheduler: traces,
//! metrics, alerting on timing violations.
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs independently of the scheduler loop)
//! - **Per-subscriber bounded queue** (capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (a panicking subscriber is logged and keeps receiving)
//!
//! ```text
//! SubscriberSet ──► [bounded queue] ──► worker task ──► subscriber.on_event()
//! ```
//!
//! A slow subscriber only loses its own events: the scheduler loop never
//! waits on observers, so observing can never cause an overrun.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use tickvisor::{Event, EventKind, Subscribe};
//!
//! struct Violations;
//!
//! #[async_trait]
//! impl Subscribe for Violations {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::TimingViolation) {
//!             // page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "violations" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for scheduler observability.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor the scheduler runs on.
/// - Handle errors internally; do not panic.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event, in FIFO order per subscriber.
    async fn on_event(&self, event: &Event);

    /// Name used in drop/panic diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity (clamped to at least 1).
    ///
    /// At high tick rates every tick produces an event; size the queue for
    /// a few periods of backlog.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
