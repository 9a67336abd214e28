//! # Scheduler: startup, steady-state tick loop, dispatch.
//!
//! The [`Scheduler`] owns the clock, the worker registry, the event bus and
//! the coordination store for the duration of one run.
//!
//! ## Phases
//! ```text
//! run(specs)
//!   │
//!   ├─ startup: for each spec, in order
//!   │     launch ──► WorkerLaunched | WorkerAttached
//!   │     spawned? wait_ready ──► WorkerReady
//!   │     (interrupt or worker death while waiting → teardown)
//!   │   clock.arm(period) ──► ClockArmed
//!   │
//!   ├─ steady state: sleep until a counter is raised, then dispatch by priority
//!   │     Interrupt  ──► ShutdownRequested → teardown(Interrupted)
//!   │     ChildDied  ──► reap → WorkerDied → teardown(WorkerDied)
//!   │     ClockFired ──► handle one tick (below)
//!   │
//!   └─ teardown(reason) ──► ExitReason
//! ```
//!
//! ## One tick
//! ```text
//! pending clock ≥ 2 ?  ──yes──► OverrunDetected → teardown(Overrun)
//! probe every live worker:  busy → TimingViolation (run continues)
//! wake every live worker
//! store.publish_tick(step) ──► step += 1 ──► consume one ClockFired ──► TickPublished
//! ```
//!
//! ## Rules
//! - Signal delivery never runs scheduler logic; it only raises counters.
//! - Between two clock notifications the loop does at most one tick's work.
//! - A timing violation is reported, never fatal by default.
//! - Teardown side effects happen at most once per run.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::config::Config;
use super::realtime::Realtime;
use super::registry::{WorkerRecord, WorkerRegistry};
use super::shutdown;
use super::signals::{PendingSignals, SignalKind};
use super::teardown::ExitReason;
use crate::clock::Clock;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::store::{CompletionFlag, CoordinationStore, RunStatus};
use crate::subscribers::SubscriberSet;
use crate::workers::{ExitStatus, Launcher, WorkerLink, WorkerSpec};

use super::builder::SchedulerBuilder;

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Why the run ended.
    pub exit: ExitReason,
    /// Ticks published (also the next step that would have been used).
    pub ticks: u64,
    /// Timing violations reported over the run.
    pub violations: u64,
    /// Final state of every worker, in launch order.
    pub workers: Vec<WorkerRecord>,
}

impl RunReport {
    /// Process exit code of the run.
    pub fn exit_code(&self) -> i32 {
        self.exit.code()
    }
}

/// Tick scheduler and worker supervisor.
///
/// Built with [`Scheduler::builder`]; consumed by [`Scheduler::run`].
pub struct Scheduler {
    pub(super) cfg: Config,
    pub(super) bus: Bus,
    pub(super) subs: SubscriberSet,
    pub(super) store: Arc<dyn CoordinationStore>,
    pub(super) link: Arc<dyn WorkerLink>,
    pub(super) launcher: Arc<dyn Launcher>,
    pub(super) clock: Box<dyn Clock>,
    pub(super) pending: Arc<PendingSignals>,
    pub(super) os_signals: bool,
}

impl Scheduler {
    /// Starts building a scheduler over `store`.
    pub fn builder(cfg: Config, store: Arc<dyn CoordinationStore>) -> SchedulerBuilder {
        SchedulerBuilder::new(cfg, store)
    }

    /// Configuration of this scheduler.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Receiver of every event the run publishes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Pending counters of this scheduler.
    ///
    /// Raising [`SignalKind::Interrupt`] here is equivalent to the operator
    /// sending `SIGINT`.
    pub fn signals(&self) -> Arc<PendingSignals> {
        Arc::clone(&self.pending)
    }

    /// Turns the store's worker registry into launchable specs.
    ///
    /// Names found in `catalog` use its launch recipe; every other name is
    /// attached to an already-running process.
    pub async fn resolve(&self, catalog: &[WorkerSpec]) -> Result<Vec<WorkerSpec>, RuntimeError> {
        let names = self.store.worker_list().await?;
        Ok(names
            .into_iter()
            .map(|name| {
                catalog
                    .iter()
                    .find(|s| s.name() == name)
                    .cloned()
                    .unwrap_or_else(|| WorkerSpec::attach(name))
            })
            .collect())
    }

    /// Supervises `specs` until the run ends.
    ///
    /// Returns `Err` only when startup fails; whatever was already launched
    /// is torn down first. Every other ending is reported through
    /// [`RunReport::exit`].
    pub async fn run(self, specs: Vec<WorkerSpec>) -> Result<RunReport, RuntimeError> {
        let Scheduler {
            cfg,
            bus,
            subs,
            store,
            link,
            launcher,
            clock,
            pending,
            os_signals,
        } = self;

        let listener = subscriber_listener(&bus, subs);
        let mut run = Run::new(cfg, bus, store, link, launcher, clock, pending);

        let mut _os = None;
        let started = match run.preflight(os_signals) {
            Ok(listeners) => {
                _os = listeners;
                run.startup(specs).await
            }
            Err(e) => Err(e),
        };

        let result = match started {
            Ok(None) => Ok(run.serve().await),
            Ok(Some(reason)) => Ok(run.teardown(reason).await),
            Err(e) => {
                warn!(error = %e, label = e.as_label(), "startup failed");
                run.teardown(ExitReason::StartupFailed).await;
                Err(e)
            }
        };

        let report = result.map(|exit| run.report(exit));
        // Closing the bus lets subscribers drain what was published.
        drop(run);
        let _ = listener.await;
        report
    }
}

/// Forwards bus events to the subscriber set until the bus closes.
fn subscriber_listener(bus: &Bus, subs: SubscriberSet) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => subs.emit(&ev),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "subscriber listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        subs.shutdown().await;
    })
}

/// Result of racing a startup step against abort conditions.
enum Raced<T> {
    Done(T),
    Aborted(ExitReason),
}

/// State of one run. Lives from startup to the end of teardown.
pub(super) struct Run {
    pub(super) cfg: Config,
    pub(super) bus: Bus,
    pub(super) store: Arc<dyn CoordinationStore>,
    pub(super) link: Arc<dyn WorkerLink>,
    pub(super) launcher: Arc<dyn Launcher>,
    pub(super) clock: Box<dyn Clock>,
    pub(super) pending: Arc<PendingSignals>,
    pub(super) registry: WorkerRegistry,
    pub(super) step: u64,
    pub(super) violations: u64,
    pub(super) exit: Option<ExitReason>,
    pub(super) realtime: Realtime,
}

impl Run {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        cfg: Config,
        bus: Bus,
        store: Arc<dyn CoordinationStore>,
        link: Arc<dyn WorkerLink>,
        launcher: Arc<dyn Launcher>,
        clock: Box<dyn Clock>,
        pending: Arc<PendingSignals>,
    ) -> Self {
        Self {
            cfg,
            bus,
            store,
            link,
            launcher,
            clock,
            pending,
            registry: WorkerRegistry::new(),
            step: 0,
            violations: 0,
            exit: None,
            realtime: Realtime::default(),
        }
    }

    /// Checks the configuration and installs the OS listeners, if wanted.
    fn preflight(&self, os_signals: bool) -> Result<Option<shutdown::OsListeners>, RuntimeError> {
        self.cfg.validate()?;
        if !os_signals {
            return Ok(None);
        }
        shutdown::install(Arc::clone(&self.pending))
            .map(Some)
            .map_err(RuntimeError::SignalInstall)
    }

    /// Publishes a run-state transition. A failure is logged, never fatal.
    pub(super) async fn publish_status(&self, status: RunStatus) {
        if let Err(e) = self.store.publish_status(status.clone()).await {
            warn!(status = %status, error = %e, label = e.as_label(), "status not published");
        }
    }

    /// Launches every worker in order, then arms the clock.
    ///
    /// `Ok(Some(reason))` means an abort condition arrived before the clock
    /// was armed; the caller tears down with that reason.
    pub(super) async fn startup(
        &mut self,
        specs: Vec<WorkerSpec>,
    ) -> Result<Option<ExitReason>, RuntimeError> {
        for (i, spec) in specs.iter().enumerate() {
            if specs[..i].iter().any(|s| s.name() == spec.name()) {
                return Err(RuntimeError::DuplicateWorker {
                    name: spec.name().to_string(),
                });
            }
        }

        self.publish_status(RunStatus::Starting).await;
        self.link.prepare().await?;
        self.realtime = Realtime::enter(self.cfg.realtime_priority);

        for spec in specs {
            let name = spec.name().to_string();
            self.registry.register(&name)?;

            let launcher = Arc::clone(&self.launcher);
            let handle = match self
                .until_abort(async move { launcher.launch(&spec).await })
                .await
            {
                Raced::Done(res) => res.map_err(|source| RuntimeError::Launch {
                    worker: name.clone(),
                    source,
                })?,
                Raced::Aborted(reason) => return Ok(Some(reason)),
            };
            self.registry.set_handle(&name, handle);

            let kind = if handle.is_owned() {
                EventKind::WorkerLaunched
            } else {
                EventKind::WorkerAttached
            };
            self.bus.publish(
                Event::new(kind)
                    .with_worker(name.as_str())
                    .with_pid(handle.raw()),
            );

            if handle.is_owned() {
                let link = Arc::clone(&self.link);
                match self
                    .until_abort(async move { link.wait_ready(&handle).await })
                    .await
                {
                    Raced::Done(res) => res?,
                    Raced::Aborted(reason) => return Ok(Some(reason)),
                }
            }
            self.bus.publish(
                Event::new(EventKind::WorkerReady)
                    .with_worker(name.as_str())
                    .with_pid(handle.raw()),
            );
        }

        self.clock.arm(self.cfg.period, Arc::clone(&self.pending))?;
        self.bus.publish(
            Event::new(EventKind::ClockArmed).with_reason(format!("period={:?}", self.cfg.period)),
        );
        self.publish_status(RunStatus::Running).await;
        Ok(None)
    }

    /// Drives `fut` to completion unless an interrupt or a supervised
    /// worker's death comes first.
    async fn until_abort<F: Future>(&mut self, fut: F) -> Raced<F::Output> {
        let pending = Arc::clone(&self.pending);
        tokio::pin!(fut);
        loop {
            tokio::select! {
                biased;
                _ = pending.wait() => {
                    if let Some(reason) = self.interrupted() {
                        return Raced::Aborted(reason);
                    }
                    if pending.count(SignalKind::ChildDied) > 0 {
                        if let Some(reason) = self.on_child_died() {
                            return Raced::Aborted(reason);
                        }
                    }
                    // The clock is not armed yet; nothing it raised is a tick.
                    pending.drain(SignalKind::ClockFired);
                }
                out = &mut fut => return Raced::Done(out),
            }
        }
    }

    /// Steady state: sleep, dispatch, repeat until a handler asks for teardown.
    pub(super) async fn serve(&mut self) -> ExitReason {
        let pending = Arc::clone(&self.pending);
        loop {
            pending.wait().await;
            if let Some(reason) = self.dispatch().await {
                return self.teardown(reason).await;
            }
        }
    }

    /// Handles pending notifications, highest priority first.
    ///
    /// Priority is re-evaluated after every handled unit, so an interrupt
    /// raised during a tick is seen before the next tick.
    pub(super) async fn dispatch(&mut self) -> Option<ExitReason> {
        while let Some(kind) = self.pending.next() {
            let verdict = match kind {
                SignalKind::Interrupt => self.interrupted(),
                SignalKind::ChildDied => self.on_child_died(),
                SignalKind::ClockFired => self.on_clock().await,
            };
            if verdict.is_some() {
                return verdict;
            }
        }
        None
    }

    fn interrupted(&mut self) -> Option<ExitReason> {
        let n = self.pending.drain(SignalKind::Interrupt);
        if n == 0 {
            return None;
        }
        self.bus
            .publish(Event::new(EventKind::ShutdownRequested).with_count(n));
        Some(ExitReason::Interrupted)
    }

    /// Reaps terminated children; any supervised one ends the run.
    fn on_child_died(&mut self) -> Option<ExitReason> {
        self.pending.drain(SignalKind::ChildDied);

        let mut first: Option<String> = None;
        for reaped in self.link.reap() {
            match self.registry.by_pid_mut(reaped.pid) {
                Some(rec) => {
                    if rec.mark_dead() {
                        let mut ev = Event::new(EventKind::WorkerDied)
                            .with_worker(rec.name_arc())
                            .with_pid(reaped.pid.as_raw())
                            .with_reason(reaped.status.to_string());
                        if let ExitStatus::Exited(code) = reaped.status {
                            ev = ev.with_exit_code(code);
                        }
                        self.bus.publish(ev);
                        first.get_or_insert_with(|| rec.name().to_string());
                    }
                }
                None => debug!(pid = reaped.pid.as_raw(), status = %reaped.status, "reaped unsupervised child"),
            }
        }
        first.map(|worker| ExitReason::WorkerDied { worker })
    }

    /// Handles exactly one clock notification.
    async fn on_clock(&mut self) -> Option<ExitReason> {
        let step = self.step;
        let queued = self.pending.count(SignalKind::ClockFired);
        if queued >= 2 {
            self.bus.publish(
                Event::new(EventKind::OverrunDetected)
                    .with_step(step)
                    .with_count(queued),
            );
            return Some(ExitReason::Overrun {
                step,
                pending: queued,
            });
        }

        if let Some(reason) = self.probe_workers(step).await {
            return Some(reason);
        }
        if let Some(reason) = self.wake_workers() {
            return Some(reason);
        }

        if let Err(e) = self.store.publish_tick(step).await {
            self.bus.publish(
                Event::new(EventKind::TickLost)
                    .with_step(step)
                    .with_reason(e.to_string()),
            );
            return Some(ExitReason::TickLost { step });
        }
        self.step += 1;
        self.pending.consume(SignalKind::ClockFired);
        self.bus
            .publish(Event::new(EventKind::TickPublished).with_step(step));
        None
    }

    /// Checks that every live worker cleared its flag since the last tick.
    async fn probe_workers(&mut self, step: u64) -> Option<ExitReason> {
        let store = Arc::clone(&self.store);
        let mut stalled = None;

        for rec in self.registry.iter_mut().filter(|r| r.is_alive()) {
            match store.probe(rec.name()).await {
                Ok(CompletionFlag::Idle) => rec.record_idle(),
                Ok(CompletionFlag::Busy) => {
                    let consecutive = rec.record_violation();
                    self.violations += 1;
                    self.bus.publish(
                        Event::new(EventKind::TimingViolation)
                            .with_worker(rec.name_arc())
                            .with_step(step)
                            .with_count(u64::from(consecutive)),
                    );
                    if stalled.is_none() && self.cfg.violations.escalates(consecutive) {
                        self.bus.publish(
                            Event::new(EventKind::WorkerStalled)
                                .with_worker(rec.name_arc())
                                .with_step(step)
                                .with_count(u64::from(consecutive)),
                        );
                        stalled = Some(ExitReason::WorkerStalled {
                            worker: rec.name().to_string(),
                            consecutive,
                        });
                    }
                }
                Err(e) => self.bus.publish(
                    Event::new(EventKind::ProbeFailed)
                        .with_worker(rec.name_arc())
                        .with_step(step)
                        .with_reason(e.to_string()),
                ),
            }
        }
        stalled
    }

    /// Sends the wake notification to every live worker.
    fn wake_workers(&mut self) -> Option<ExitReason> {
        let mut gone: Option<String> = None;
        for rec in self.registry.iter_mut().filter(|r| r.is_alive()) {
            let Some(handle) = rec.handle() else { continue };
            match self.link.wake(&handle) {
                Ok(()) => {}
                Err(e) if e.is_gone() => {
                    if rec.mark_dead() {
                        self.bus.publish(
                            Event::new(EventKind::WorkerDied)
                                .with_worker(rec.name_arc())
                                .with_pid(handle.raw())
                                .with_reason(e.to_string()),
                        );
                        gone.get_or_insert_with(|| rec.name().to_string());
                    }
                }
                Err(e) => self.bus.publish(
                    Event::new(EventKind::WakeFailed)
                        .with_worker(rec.name_arc())
                        .with_pid(handle.raw())
                        .with_reason(e.to_string()),
                ),
            }
        }
        gone.map(|worker| ExitReason::WorkerDied { worker })
    }

    fn report(&self, exit: ExitReason) -> RunReport {
        RunReport {
            exit,
            ticks: self.step,
            violations: self.violations,
            workers: self.registry.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::core::Liveness;
    use crate::policies::ViolationPolicy;
    use crate::store::FsStore;
    use crate::subscribers::Subscribe;
    use crate::testkit::{Testbed, drain, next_of, of_kind};

    const ABC: &[&str] = &["A", "B", "C"];

    fn cfg() -> Config {
        Config::default().with_period_micros(1000)
    }

    async fn started(
        bed: &Testbed,
        cfg: Config,
    ) -> (
        JoinHandle<Result<RunReport, RuntimeError>>,
        broadcast::Receiver<Event>,
        Arc<PendingSignals>,
        Vec<Event>,
    ) {
        let sched = bed.scheduler(cfg);
        let mut rx = sched.subscribe();
        let pending = sched.signals();
        let specs = sched.resolve(&Testbed::catalog(ABC)).await.unwrap();
        let run = tokio::spawn(sched.run(specs));
        let mut seen = Vec::new();
        next_of(&mut rx, &mut seen, EventKind::ClockArmed).await;
        (run, rx, pending, seen)
    }

    #[tokio::test]
    async fn three_workers_violation_then_death() {
        let bed = Testbed::new(ABC);
        let (run, mut rx, pending, mut seen) = started(&bed, cfg()).await;
        assert_eq!(bed.launched(), vec!["A", "B", "C"]);

        for expected in 0..5 {
            assert!(bed.clock.fire());
            let ev = next_of(&mut rx, &mut seen, EventKind::TickPublished).await;
            assert_eq!(ev.step, Some(expected));
        }
        assert_eq!(bed.store.ticks().await, vec![0, 1, 2, 3, 4]);

        // Sixth firing: B starts its work and is still busy at the seventh.
        bed.clock.fire();
        next_of(&mut rx, &mut seen, EventKind::TickPublished).await;
        bed.store.set_flag("B", CompletionFlag::Busy).await.unwrap();

        bed.clock.fire();
        let ev = next_of(&mut rx, &mut seen, EventKind::TickPublished).await;
        assert_eq!(ev.step, Some(6));
        bed.store.set_flag("B", CompletionFlag::Idle).await.unwrap();

        bed.clock.fire();
        let ev = next_of(&mut rx, &mut seen, EventKind::TickPublished).await;
        assert_eq!(ev.step, Some(7));

        bed.kill("C", &pending);
        let report = run.await.unwrap().unwrap();
        drain(&mut rx, &mut seen);

        let violations = of_kind(&seen, EventKind::TimingViolation);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].worker.as_deref(), Some("B"));
        assert_eq!(violations[0].step, Some(6));

        assert_eq!(
            report.exit,
            ExitReason::WorkerDied {
                worker: "C".into()
            }
        );
        assert_eq!(report.exit_code(), 4);
        assert_eq!(report.ticks, 8);
        assert_eq!(report.violations, 1);
        assert_eq!(bed.store.ticks().await, (0..8).collect::<Vec<u64>>());
        assert_eq!(bed.link.wakes("B"), 8);

        assert_eq!(bed.link.terminated(), vec!["A", "B"]);
        assert!(bed.link.terminated_after_disarm());
        assert_eq!(bed.clock.disarms(), 1);
        assert_eq!(bed.store.releases().await, 1);

        let b = report.workers.iter().find(|w| w.name() == "B").unwrap();
        assert_eq!(b.violations(), 1);
        let c = report.workers.iter().find(|w| w.name() == "C").unwrap();
        assert_eq!(c.liveness(), Liveness::Dead);

        let complete = of_kind(&seen, EventKind::TeardownComplete);
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].exit_code, Some(4));
    }

    #[tokio::test]
    async fn ticks_are_contiguous_from_zero() {
        let bed = Testbed::new(ABC);
        let (run, mut rx, pending, mut seen) = started(&bed, cfg()).await;

        for _ in 0..20 {
            bed.clock.fire();
            next_of(&mut rx, &mut seen, EventKind::TickPublished).await;
        }
        pending.raise(SignalKind::Interrupt);
        let report = run.await.unwrap().unwrap();

        let steps: Vec<u64> = of_kind(&seen, EventKind::TickPublished)
            .iter()
            .filter_map(|e| e.step)
            .collect();
        assert_eq!(steps, (0..20).collect::<Vec<u64>>());
        assert_eq!(bed.store.ticks().await, steps);
        assert_eq!(report.exit, ExitReason::Interrupted);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(bed.link.terminated(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn two_pending_clock_notifications_are_an_overrun() {
        let bed = Testbed::new(ABC);
        let (run, mut rx, _pending, mut seen) = started(&bed, cfg()).await;

        bed.clock.fire();
        bed.clock.fire();
        let report = run.await.unwrap().unwrap();
        drain(&mut rx, &mut seen);

        assert_eq!(report.exit, ExitReason::Overrun { step: 0, pending: 2 });
        assert_eq!(report.exit_code(), 3);
        assert!(bed.store.ticks().await.is_empty());
        assert_eq!(bed.link.wakes("A"), 0);
        assert_eq!(of_kind(&seen, EventKind::OverrunDetected).len(), 1);
        assert!(of_kind(&seen, EventKind::TickPublished).is_empty());
        assert_eq!(bed.link.terminated(), vec!["A", "B", "C"]);
        assert!(bed.link.terminated_after_disarm());
    }

    #[tokio::test]
    async fn busy_worker_keeps_being_woken_under_report_policy() {
        let bed = Testbed::new(ABC);
        let (run, mut rx, pending, mut seen) = started(&bed, cfg()).await;

        bed.store.set_flag("B", CompletionFlag::Busy).await.unwrap();
        for _ in 0..4 {
            bed.clock.fire();
            next_of(&mut rx, &mut seen, EventKind::TickPublished).await;
        }
        pending.raise(SignalKind::Interrupt);
        let report = run.await.unwrap().unwrap();

        let counts: Vec<Option<u64>> = of_kind(&seen, EventKind::TimingViolation)
            .iter()
            .map(|e| e.count)
            .collect();
        assert_eq!(counts, vec![Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(bed.link.wakes("B"), 4);
        assert_eq!(report.violations, 4);
        assert_eq!(report.exit, ExitReason::Interrupted);
    }

    #[tokio::test]
    async fn escalating_policy_ends_the_run_after_consecutive_misses() {
        let bed = Testbed::new(ABC);
        let cfg = Config {
            violations: ViolationPolicy::escalate_after(2),
            ..cfg()
        };
        let (run, mut rx, _pending, mut seen) = started(&bed, cfg).await;

        bed.store.set_flag("C", CompletionFlag::Busy).await.unwrap();
        bed.clock.fire();
        next_of(&mut rx, &mut seen, EventKind::TickPublished).await;
        bed.clock.fire();
        let report = run.await.unwrap().unwrap();

        assert_eq!(
            report.exit,
            ExitReason::WorkerStalled {
                worker: "C".into(),
                consecutive: 2
            }
        );
        assert_eq!(report.exit_code(), 5);
        assert_eq!(bed.store.ticks().await, vec![0]);
    }

    #[tokio::test]
    async fn interrupt_wins_over_simultaneous_death_and_teardown_runs_once() {
        let bed = Testbed::new(ABC);
        let (run, mut rx, pending, mut seen) = started(&bed, cfg()).await;

        bed.clock.fire();
        next_of(&mut rx, &mut seen, EventKind::TickPublished).await;

        pending.raise(SignalKind::Interrupt);
        pending.raise(SignalKind::Interrupt);
        bed.kill("B", &pending);
        bed.clock.fire();
        let report = run.await.unwrap().unwrap();
        drain(&mut rx, &mut seen);

        assert_eq!(report.exit, ExitReason::Interrupted);
        assert_eq!(bed.link.terminated(), vec!["A", "B", "C"]);
        assert_eq!(bed.clock.disarms(), 1);
        assert_eq!(bed.store.releases().await, 1);
        assert_eq!(of_kind(&seen, EventKind::TeardownStarted).len(), 1);
        assert_eq!(bed.store.ticks().await, vec![0]);
    }

    #[tokio::test]
    async fn second_teardown_has_no_side_effects() {
        let bed = Testbed::new(ABC);
        let Scheduler {
            cfg,
            bus,
            store,
            link,
            launcher,
            clock,
            pending,
            ..
        } = bed.scheduler(cfg());
        let mut run = Run::new(cfg, bus, store, link, launcher, clock, pending);
        let specs = Testbed::catalog(ABC);
        assert!(run.startup(specs).await.unwrap().is_none());

        let first = run.teardown(ExitReason::Interrupted).await;
        let ops = bed.link.ops();
        let second = run
            .teardown(ExitReason::WorkerDied {
                worker: "A".into(),
            })
            .await;

        assert_eq!(first, ExitReason::Interrupted);
        assert_eq!(second, ExitReason::Interrupted);
        assert_eq!(bed.link.ops(), ops);
        assert_eq!(bed.clock.disarms(), 1);
        assert_eq!(bed.store.releases().await, 1);
    }

    #[tokio::test]
    async fn vanished_worker_is_detected_when_woken() {
        let bed = Testbed::new(ABC);
        let (run, mut rx, _pending, mut seen) = started(&bed, cfg()).await;

        bed.clock.fire();
        next_of(&mut rx, &mut seen, EventKind::TickPublished).await;
        bed.vanish("B");
        bed.clock.fire();
        let report = run.await.unwrap().unwrap();

        assert_eq!(
            report.exit,
            ExitReason::WorkerDied {
                worker: "B".into()
            }
        );
        assert_eq!(bed.link.terminated(), vec!["A", "C"]);
        assert_eq!(bed.store.ticks().await, vec![0]);
    }

    #[tokio::test]
    async fn unsupervised_child_notification_is_ignored() {
        let bed = Testbed::new(ABC);
        let (run, mut rx, pending, mut seen) = started(&bed, cfg()).await;

        pending.raise(SignalKind::ChildDied);
        bed.clock.fire();
        let ev = next_of(&mut rx, &mut seen, EventKind::TickPublished).await;
        assert_eq!(ev.step, Some(0));

        pending.raise(SignalKind::Interrupt);
        let report = run.await.unwrap().unwrap();
        assert_eq!(report.exit, ExitReason::Interrupted);
    }

    #[tokio::test]
    async fn interrupt_while_waiting_for_readiness() {
        let bed = Testbed::new(ABC);
        bed.hold_ready();
        let sched = bed.scheduler(cfg());
        let mut rx = sched.subscribe();
        let pending = sched.signals();
        let specs = sched.resolve(&Testbed::catalog(ABC)).await.unwrap();
        let run = tokio::spawn(sched.run(specs));

        let mut seen = Vec::new();
        next_of(&mut rx, &mut seen, EventKind::WorkerLaunched).await;
        pending.raise(SignalKind::Interrupt);
        let report = run.await.unwrap().unwrap();

        assert_eq!(report.exit, ExitReason::Interrupted);
        assert_eq!(bed.launched(), vec!["A"]);
        assert_eq!(bed.link.terminated(), vec!["A"]);
        assert_eq!(bed.clock.arms(), 0);
        assert_eq!(bed.store.releases().await, 1);
    }

    #[tokio::test]
    async fn worker_death_during_startup_ends_the_run() {
        let bed = Testbed::new(ABC);
        bed.hold_ready();
        let sched = bed.scheduler(cfg());
        let mut rx = sched.subscribe();
        let pending = sched.signals();
        let specs = sched.resolve(&Testbed::catalog(ABC)).await.unwrap();
        let run = tokio::spawn(sched.run(specs));

        let mut seen = Vec::new();
        next_of(&mut rx, &mut seen, EventKind::WorkerLaunched).await;
        bed.kill("A", &pending);
        let report = run.await.unwrap().unwrap();

        assert_eq!(
            report.exit,
            ExitReason::WorkerDied {
                worker: "A".into()
            }
        );
        assert!(bed.link.terminated().is_empty());
        assert_eq!(bed.clock.arms(), 0);
    }

    #[tokio::test]
    async fn attached_workers_need_no_readiness() {
        let bed = Testbed::new(ABC);
        bed.hold_ready();
        let sched = bed.scheduler(cfg());
        let mut rx = sched.subscribe();
        let pending = sched.signals();
        let specs = sched.resolve(&[]).await.unwrap();
        assert!(specs.iter().all(|s| matches!(s.launch(), crate::Launch::Attach)));
        let run = tokio::spawn(sched.run(specs));

        let mut seen = Vec::new();
        next_of(&mut rx, &mut seen, EventKind::ClockArmed).await;
        assert_eq!(of_kind(&seen, EventKind::WorkerAttached).len(), 3);
        assert_eq!(of_kind(&seen, EventKind::WorkerReady).len(), 3);

        pending.raise(SignalKind::Interrupt);
        assert_eq!(run.await.unwrap().unwrap().exit, ExitReason::Interrupted);
    }

    #[tokio::test]
    async fn launch_failure_tears_down_what_was_started() {
        let bed = Testbed::new(ABC);
        bed.fail_launch("B");
        let sched = bed.scheduler(cfg());
        let specs = sched.resolve(&Testbed::catalog(ABC)).await.unwrap();

        let err = sched.run(specs).await.unwrap_err();
        assert!(matches!(&err, RuntimeError::Launch { worker, .. } if worker == "B"));
        assert_eq!(bed.link.terminated(), vec!["A"]);
        assert_eq!(bed.clock.arms(), 0);
        assert_eq!(bed.store.releases().await, 1);
    }

    #[tokio::test]
    async fn duplicate_worker_is_rejected_before_launching() {
        let bed = Testbed::new(&[]);
        let sched = bed.scheduler(cfg());
        let specs = Testbed::catalog(&["A", "B", "A"]);

        let err = sched.run(specs).await.unwrap_err();
        assert!(matches!(err, RuntimeError::DuplicateWorker { name } if name == "A"));
        assert!(bed.launched().is_empty());
    }

    #[tokio::test]
    async fn zero_period_is_rejected() {
        let bed = Testbed::new(ABC);
        let cfg = Config {
            period: std::time::Duration::ZERO,
            ..cfg()
        };
        let err = bed.scheduler(cfg).run(Vec::new()).await.unwrap_err();
        assert_eq!(err.as_label(), "runtime_invalid_config");
        assert_eq!(bed.store.releases().await, 1);
        assert_eq!(
            bed.store.statuses().await,
            vec![RunStatus::Stopped {
                code: 1,
                reason: "startup_failed"
            }]
        );
    }

    #[tokio::test]
    async fn rejected_config_leaves_no_lock_behind() {
        let dir = tempfile::tempdir().unwrap();
        let bed = Testbed::new(&[]);
        let cfg = Config {
            realtime_priority: Some(500),
            ..cfg()
        };
        let sched = Scheduler::builder(cfg, Arc::new(FsStore::open(dir.path()).unwrap()))
            .with_link(bed.link.clone())
            .with_launcher(bed.launcher.clone())
            .with_clock(bed.clock.clone())
            .without_os_signals()
            .build();

        let err = sched.run(Vec::new()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidConfig { .. }));
        assert!(!dir.path().join("scheduler.lock").exists());
        assert!(FsStore::open(dir.path()).is_ok());
    }

    #[tokio::test]
    async fn status_channel_follows_the_run() {
        let bed = Testbed::new(ABC);
        let (run, mut rx, pending, mut seen) = started(&bed, cfg()).await;
        bed.clock.fire();
        next_of(&mut rx, &mut seen, EventKind::TickPublished).await;

        pending.raise(SignalKind::Interrupt);
        run.await.unwrap().unwrap();
        assert_eq!(
            bed.store.statuses().await,
            vec![
                RunStatus::Starting,
                RunStatus::Running,
                RunStatus::Stopped {
                    code: 0,
                    reason: "interrupted"
                },
            ]
        );
    }

    #[tokio::test]
    async fn failed_launch_goes_from_starting_to_stopped() {
        let bed = Testbed::new(ABC);
        bed.fail_launch("A");
        let sched = bed.scheduler(cfg());
        let specs = sched.resolve(&Testbed::catalog(ABC)).await.unwrap();

        sched.run(specs).await.unwrap_err();
        assert_eq!(
            bed.store.statuses().await,
            vec![
                RunStatus::Starting,
                RunStatus::Stopped {
                    code: 1,
                    reason: "startup_failed"
                },
            ]
        );
    }

    #[tokio::test]
    async fn interval_clock_sustains_a_millisecond_period() {
        let bed = Testbed::new(ABC);
        let sched = Scheduler::builder(cfg(), bed.store.clone())
            .with_link(bed.link.clone())
            .with_launcher(bed.launcher.clone())
            .with_clock(crate::clock::IntervalClock::new())
            .without_os_signals()
            .build();
        let mut rx = sched.subscribe();
        let pending = sched.signals();
        let run = tokio::spawn(sched.run(Testbed::catalog(ABC)));

        let mut seen = Vec::new();
        next_of(&mut rx, &mut seen, EventKind::ClockArmed).await;
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        pending.raise(SignalKind::Interrupt);
        let report = run.await.unwrap().unwrap();

        assert_eq!(report.exit, ExitReason::Interrupted);
        assert!(report.ticks >= 50, "only {} ticks in 200ms", report.ticks);
        assert_eq!(
            bed.store.ticks().await,
            (0..report.ticks).collect::<Vec<u64>>()
        );
        assert_eq!(bed.link.wakes("A") as u64, report.ticks);
    }

    struct Collect(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.kind);
        }
    }

    #[tokio::test]
    async fn subscribers_have_seen_everything_when_run_returns() {
        let bed = Testbed::new(ABC);
        let collect = Arc::new(Collect(Mutex::new(Vec::new())));
        let sched = Scheduler::builder(cfg(), bed.store.clone())
            .with_link(bed.link.clone())
            .with_launcher(bed.launcher.clone())
            .with_clock(bed.clock.clone())
            .with_subscribers(vec![collect.clone()])
            .without_os_signals()
            .build();
        sched.signals().raise(SignalKind::Interrupt);

        let report = sched.run(Testbed::catalog(ABC)).await.unwrap();
        assert_eq!(report.exit, ExitReason::Interrupted);

        let kinds = collect.0.lock().unwrap().clone();
        assert_eq!(kinds.first(), Some(&EventKind::ShutdownRequested));
        assert_eq!(kinds.last(), Some(&EventKind::TeardownComplete));
    }
}
