//! # Event subscribers for the tickvisor runtime.
//!
//! Provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and the
//! built-in [`LogWriter`].
//!
//! ```text
//! Scheduler ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet
//!                                                                  │
//!                                                       ┌──────────┼─────────┐
//!                                                       ▼          ▼         ▼
//!                                                   LogWriter   Metrics   Custom
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
