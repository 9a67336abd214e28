//! # Event bus for broadcasting scheduler events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so the scheduler loop can report
//! every state transition without ever blocking on an observer.
//!
//! ```text
//!   Scheduler loop ──publish──► Bus ──► subscriber_listener ──► SubscriberSet
//!                                  └──► any other receiver (tests, embedders)
//! ```
//!
//! ## Rules
//! - `publish()` never blocks; a handler can call it on every tick.
//! - One ring buffer of `capacity` events is shared by all receivers.
//! - A receiver that falls behind gets `RecvError::Lagged(n)` and skips `n` events.
//! - Events sent while nobody subscribes are dropped.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for scheduler events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates an independent receiver for events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
