use std::sync::Arc;

use super::config::Config;
use super::scheduler::Scheduler;
use super::signals::PendingSignals;
use crate::clock::{Clock, IntervalClock};
use crate::events::Bus;
use crate::store::CoordinationStore;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::workers::{Launcher, ProcessLauncher, SignalLink, WorkerLink};

/// Builder for a [`Scheduler`] with replaceable collaborators.
///
/// Defaults: [`IntervalClock`], [`SignalLink`] with the standard signal map,
/// [`ProcessLauncher`] polling at [`Config::attach_poll`], OS signal
/// listeners installed, no subscribers.
pub struct SchedulerBuilder {
    cfg: Config,
    store: Arc<dyn CoordinationStore>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    link: Option<Arc<dyn WorkerLink>>,
    launcher: Option<Arc<dyn Launcher>>,
    clock: Option<Box<dyn Clock>>,
    os_signals: bool,
}

impl SchedulerBuilder {
    /// Creates a builder with the given configuration and store.
    pub fn new(cfg: Config, store: Arc<dyn CoordinationStore>) -> Self {
        Self {
            cfg,
            store,
            subscribers: Vec::new(),
            link: None,
            launcher: None,
            clock: None,
            os_signals: true,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events through dedicated workers with
    /// bounded queues; they never slow the tick loop down.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the worker notification channel.
    pub fn with_link(mut self, link: Arc<dyn WorkerLink>) -> Self {
        self.link = Some(link);
        self
    }

    /// Replaces the process launcher.
    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Replaces the clock source.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Skips installing OS signal listeners.
    ///
    /// Interrupts and child deaths then only arrive through
    /// [`Scheduler::signals`].
    pub fn without_os_signals(mut self) -> Self {
        self.os_signals = false;
        self
    }

    /// Builds the scheduler.
    ///
    /// Must be called from within a tokio runtime (subscriber workers are
    /// spawned here).
    pub fn build(self) -> Scheduler {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers);
        let link = self
            .link
            .unwrap_or_else(|| Arc::new(SignalLink::default()));
        let launcher = self
            .launcher
            .unwrap_or_else(|| Arc::new(ProcessLauncher::new(self.cfg.attach_poll)));
        let clock = self
            .clock
            .unwrap_or_else(|| Box::new(IntervalClock::new()));

        Scheduler {
            cfg: self.cfg,
            bus,
            subs,
            store: self.store,
            link,
            launcher,
            clock,
            pending: Arc::new(PendingSignals::new()),
            os_signals: self.os_signals,
        }
    }
}
