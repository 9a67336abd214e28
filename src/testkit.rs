//! Scripted collaborators for driving a scheduler in tests.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nix::unistd::Pid;
use tokio::sync::broadcast;

use crate::clock::{Clock, ManualClock};
use crate::core::{Config, PendingSignals, Scheduler, SignalKind};
use crate::error::{LaunchError, LinkError};
use crate::events::{Event, EventKind};
use crate::store::MemoryStore;
use crate::workers::{ExitStatus, Launch, Launcher, ProcessHandle, Reaped, WorkerLink, WorkerSpec};

type Roster = Arc<Mutex<Vec<(String, Pid)>>>;

/// Hands out pids 100, 101, ... in launch order.
pub(crate) struct MockLauncher {
    roster: Roster,
    next: AtomicI32,
    fail: Mutex<Option<String>>,
}

#[async_trait]
impl Launcher for MockLauncher {
    async fn launch(&self, spec: &WorkerSpec) -> Result<ProcessHandle, LaunchError> {
        if self.fail.lock().unwrap().as_deref() == Some(spec.name()) {
            return Err(LaunchError::Spawn {
                program: spec.to_string(),
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }
        let pid = Pid::from_raw(self.next.fetch_add(1, Ordering::SeqCst));
        self.roster
            .lock()
            .unwrap()
            .push((spec.name().to_string(), pid));
        Ok(match spec.launch() {
            Launch::Spawn { .. } => ProcessHandle::spawned(pid),
            Launch::Attach => ProcessHandle::attached(pid),
        })
    }
}

/// Operations the scheduler performed on workers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Op {
    Wake(String),
    Terminate { worker: String, clock_armed: bool },
}

/// Records every operation; children "exit" when the test says so.
pub(crate) struct MockLink {
    roster: Roster,
    clock: ManualClock,
    ops: Mutex<Vec<Op>>,
    exited: Mutex<Vec<Reaped>>,
    vanished: Mutex<Vec<Pid>>,
    hold_ready: AtomicBool,
}

impl MockLink {
    fn name_of(&self, pid: Pid) -> String {
        self.roster
            .lock()
            .unwrap()
            .iter()
            .find(|(_, p)| *p == pid)
            .map(|(n, _)| n.clone())
            .unwrap_or_else(|| format!("pid-{pid}"))
    }

    pub(crate) fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub(crate) fn wakes(&self, worker: &str) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, Op::Wake(w) if w == worker))
            .count()
    }

    pub(crate) fn terminated(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Terminate { worker, .. } => Some(worker),
                Op::Wake(_) => None,
            })
            .collect()
    }

    /// True if every terminate happened while the clock was disarmed.
    pub(crate) fn terminated_after_disarm(&self) -> bool {
        self.ops()
            .iter()
            .all(|op| !matches!(op, Op::Terminate { clock_armed: true, .. }))
    }
}

#[async_trait]
impl WorkerLink for MockLink {
    async fn wait_ready(&self, _worker: &ProcessHandle) -> Result<(), LinkError> {
        if self.hold_ready.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    fn wake(&self, worker: &ProcessHandle) -> Result<(), LinkError> {
        if self.vanished.lock().unwrap().contains(&worker.pid()) {
            return Err(LinkError::Gone { pid: worker.raw() });
        }
        self.ops
            .lock()
            .unwrap()
            .push(Op::Wake(self.name_of(worker.pid())));
        Ok(())
    }

    fn terminate(&self, worker: &ProcessHandle) -> Result<(), LinkError> {
        let op = Op::Terminate {
            worker: self.name_of(worker.pid()),
            clock_armed: self.clock.is_armed(),
        };
        self.ops.lock().unwrap().push(op);
        Ok(())
    }

    fn reap(&self) -> Vec<Reaped> {
        std::mem::take(&mut *self.exited.lock().unwrap())
    }
}

/// Memory store, manual clock, scripted launcher and link, wired together.
pub(crate) struct Testbed {
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) clock: ManualClock,
    pub(crate) link: Arc<MockLink>,
    pub(crate) launcher: Arc<MockLauncher>,
}

impl Testbed {
    /// Store registry lists `workers` in order.
    pub(crate) fn new(workers: &[&str]) -> Self {
        let roster = Roster::default();
        let clock = ManualClock::new();
        Self {
            store: Arc::new(MemoryStore::with_workers(workers.iter().copied())),
            link: Arc::new(MockLink {
                roster: Arc::clone(&roster),
                clock: clock.clone(),
                ops: Mutex::default(),
                exited: Mutex::default(),
                vanished: Mutex::default(),
                hold_ready: AtomicBool::new(false),
            }),
            launcher: Arc::new(MockLauncher {
                roster,
                next: AtomicI32::new(100),
                fail: Mutex::default(),
            }),
            clock,
        }
    }

    pub(crate) fn scheduler(&self, cfg: Config) -> Scheduler {
        Scheduler::builder(cfg, self.store.clone())
            .with_link(self.link.clone())
            .with_launcher(self.launcher.clone())
            .with_clock(self.clock.clone())
            .without_os_signals()
            .build()
    }

    /// Spawn recipes for `names`.
    pub(crate) fn catalog(names: &[&str]) -> Vec<WorkerSpec> {
        names
            .iter()
            .map(|n| WorkerSpec::spawn(*n, format!("/opt/rig/{n}"), Vec::<String>::new()))
            .collect()
    }

    /// Spawned workers never announce readiness.
    pub(crate) fn hold_ready(&self) {
        self.link.hold_ready.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_launch(&self, name: &str) {
        *self.launcher.fail.lock().unwrap() = Some(name.to_string());
    }

    pub(crate) fn launched(&self) -> Vec<String> {
        self.launcher
            .roster
            .lock()
            .unwrap()
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub(crate) fn pid_of(&self, name: &str) -> Pid {
        self.launcher
            .roster
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| *p)
            .expect("worker was never launched")
    }

    /// Worker exits; the notification is delivered like a SIGCHLD.
    pub(crate) fn kill(&self, name: &str, pending: &PendingSignals) {
        let pid = self.pid_of(name);
        self.link.exited.lock().unwrap().push(Reaped {
            pid,
            status: ExitStatus::Exited(1),
        });
        pending.raise(SignalKind::ChildDied);
    }

    /// Worker disappears without a child notification (e.g. an attached process).
    pub(crate) fn vanish(&self, name: &str) {
        let pid = self.pid_of(name);
        self.link.vanished.lock().unwrap().push(pid);
    }
}

/// Receives until an event of `kind` arrives; everything seen is kept.
pub(crate) async fn next_of(
    rx: &mut broadcast::Receiver<Event>,
    seen: &mut Vec<Event>,
    kind: EventKind,
) -> Event {
    loop {
        let ev = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {kind:?}"))
            .expect("bus closed");
        seen.push(ev.clone());
        if ev.kind == kind {
            return ev;
        }
    }
}

/// Collects whatever is still buffered.
pub(crate) fn drain(rx: &mut broadcast::Receiver<Event>, seen: &mut Vec<Event>) {
    while let Ok(ev) = rx.try_recv() {
        seen.push(ev);
    }
}

pub(crate) fn of_kind(seen: &[Event], kind: EventKind) -> Vec<&Event> {
    seen.iter().filter(|e| e.kind == kind).collect()
}
