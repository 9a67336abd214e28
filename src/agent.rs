//! # Worker-side protocol helper.
//!
//! A worker process embeds a [`WorkerAgent`] to follow its half of the
//! protocol: announce readiness once, wait for wake notifications, keep its
//! completion flag honest around each tick's work, and stop on request.
//!
//! ```text
//! announce_ready()          ── once, after initialization
//! loop next_tick():
//!     begin()   → flag = busy
//!     ... work ...
//!     finish()  → flag = idle   (must happen before the next tick)
//! terminate  → next_tick() returns false
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use tickvisor::{FsStore, SignalMap, WorkerAgent};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(FsStore::connect("/run/rig"));
//!     let mut agent = WorkerAgent::from_env(store, SignalMap::default())?;
//!     let handled = agent
//!         .run(|step| async move {
//!             // one period worth of work
//!             let _ = step;
//!         })
//!         .await?;
//!     eprintln!("stopped after {handled} ticks");
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use nix::unistd::{Pid, getppid};
use tokio::signal::unix;
use tracing::debug;

use crate::error::AgentError;
use crate::store::{CompletionFlag, CoordinationStore};
use crate::workers::{ENV_SUPERVISOR_PID, ENV_WORKER_NAME, SignalMap, listen, send};

/// Worker half of the tick protocol.
pub struct WorkerAgent {
    name: Arc<str>,
    store: Arc<dyn CoordinationStore>,
    parent: Pid,
    map: SignalMap,
    ticks: unix::Signal,
    stop: unix::Signal,
    announced: bool,
}

impl WorkerAgent {
    /// Creates an agent for worker `name` supervised by `parent`.
    ///
    /// Installs the wake and terminate listeners immediately, so no
    /// notification sent after this call is lost. Must be called inside a
    /// tokio runtime.
    pub fn new(
        name: impl Into<Arc<str>>,
        store: Arc<dyn CoordinationStore>,
        parent: Pid,
        map: SignalMap,
    ) -> Result<Self, AgentError> {
        Ok(Self {
            name: name.into(),
            store,
            parent,
            ticks: listen(map.wake)?,
            stop: listen(map.terminate)?,
            map,
            announced: false,
        })
    }

    /// Creates an agent from the environment a spawned worker inherits.
    ///
    /// Falls back to the parent pid when the scheduler pid is not set.
    pub fn from_env(store: Arc<dyn CoordinationStore>, map: SignalMap) -> Result<Self, AgentError> {
        let name = std::env::var(ENV_WORKER_NAME)
            .map_err(|_| AgentError::MissingEnv(ENV_WORKER_NAME))?;
        let parent = std::env::var(ENV_SUPERVISOR_PID)
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .map(Pid::from_raw)
            .unwrap_or_else(getppid);
        Self::new(name, store, parent, map)
    }

    /// Worker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tells the scheduler initialization is done.
    ///
    /// Only the first call sends anything; returns whether this call did.
    pub fn announce_ready(&mut self) -> Result<bool, AgentError> {
        if self.announced {
            return Ok(false);
        }
        send(self.parent, self.map.ready)?;
        self.announced = true;
        debug!(worker = %self.name, parent = self.parent.as_raw(), "announced ready");
        Ok(true)
    }

    /// Waits for the next wake notification.
    ///
    /// Returns `false` once termination was requested; a pending termination
    /// wins over a pending tick.
    pub async fn next_tick(&mut self) -> bool {
        tokio::select! {
            biased;
            _ = self.stop.recv() => false,
            got = self.ticks.recv() => got.is_some(),
        }
    }

    /// Marks this worker busy with the current tick.
    pub async fn begin(&self) -> Result<(), AgentError> {
        self.store.set_flag(&self.name, CompletionFlag::Busy).await?;
        Ok(())
    }

    /// Marks this worker done with the current tick.
    pub async fn finish(&self) -> Result<(), AgentError> {
        self.store.set_flag(&self.name, CompletionFlag::Idle).await?;
        Ok(())
    }

    /// Announces readiness, then runs `work` once per tick until terminated.
    ///
    /// `work` receives the local count of handled ticks. Returns that count.
    pub async fn run<F, Fut>(&mut self, mut work: F) -> Result<u64, AgentError>
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = ()>,
    {
        self.finish().await?;
        self.announce_ready()?;

        let mut handled = 0u64;
        while self.next_tick().await {
            self.begin().await?;
            work(handled).await;
            self.finish().await?;
            handled += 1;
        }
        debug!(worker = %self.name, handled, "terminate received");
        Ok(handled)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use nix::sys::signal::Signal;
    use nix::unistd::getpid;
    use tokio::time::timeout;

    use super::*;
    use crate::store::MemoryStore;
    use crate::workers::{ProcessHandle, SignalLink, WorkerLink};

    #[tokio::test]
    async fn handshake_wake_and_stop_over_real_signals() {
        // SIGHUP instead of SIGINT keeps the test harness out of it.
        let map = SignalMap {
            wake: Signal::SIGUSR1,
            ready: Signal::SIGUSR2,
            terminate: Signal::SIGHUP,
        };
        let link = SignalLink::new(map);
        link.prepare().await.unwrap();

        let store = Arc::new(MemoryStore::new());
        let me = ProcessHandle::spawned(getpid());
        let mut agent = WorkerAgent::new("loopback", store.clone(), getpid(), map).unwrap();

        assert!(agent.announce_ready().unwrap());
        assert!(!agent.announce_ready().unwrap());
        timeout(Duration::from_secs(5), link.wait_ready(&me))
            .await
            .expect("ready not observed")
            .unwrap();

        link.wake(&me).unwrap();
        assert!(timeout(Duration::from_secs(5), agent.next_tick()).await.unwrap());
        agent.begin().await.unwrap();
        assert_eq!(store.probe("loopback").await.unwrap(), CompletionFlag::Busy);
        agent.finish().await.unwrap();
        assert_eq!(store.probe("loopback").await.unwrap(), CompletionFlag::Idle);

        link.terminate(&me).unwrap();
        assert!(!timeout(Duration::from_secs(5), agent.next_tick()).await.unwrap());
    }

    #[tokio::test]
    async fn from_env_requires_a_worker_name() {
        // The test harness never sets the variable.
        if std::env::var_os(ENV_WORKER_NAME).is_some() {
            return;
        }
        let store = Arc::new(MemoryStore::new());
        let err = WorkerAgent::from_env(store, SignalMap::default())
            .err()
            .expect("must fail");
        assert_eq!(err.as_label(), "agent_missing_env");
    }
}
