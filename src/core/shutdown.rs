//! # OS signal listeners.
//!
//! Feeds process-level signals into [`PendingSignals`]:
//! - `SIGINT`, `SIGTERM`, `SIGQUIT` → [`SignalKind::Interrupt`]
//! - `SIGCHLD` → [`SignalKind::ChildDied`]
//!
//! Listener tasks only raise counters; the scheduler loop does the work.
//! Dropping [`OsListeners`] stops them.

use std::sync::Arc;

use tokio::signal::unix::{SignalKind as Os, signal};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::signals::{PendingSignals, SignalKind};

/// Running listener tasks.
pub(crate) struct OsListeners {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for OsListeners {
    fn drop(&mut self) {
        self.token.cancel();
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Installs the listeners. Fails if any OS handler cannot be registered.
pub(crate) fn install(pending: Arc<PendingSignals>) -> std::io::Result<OsListeners> {
    let mut sigint = signal(Os::interrupt())?;
    let mut sigterm = signal(Os::terminate())?;
    let mut sigquit = signal(Os::quit())?;
    let mut sigchld = signal(Os::child())?;

    let token = CancellationToken::new();

    let interrupts = {
        let token = token.clone();
        let pending = Arc::clone(&pending);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    Some(()) = sigint.recv()  => pending.raise(SignalKind::Interrupt),
                    Some(()) = sigterm.recv() => pending.raise(SignalKind::Interrupt),
                    Some(()) = sigquit.recv() => pending.raise(SignalKind::Interrupt),
                    else => break,
                }
            }
        })
    };

    let children = {
        let token = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    got = sigchld.recv() => match got {
                        Some(()) => pending.raise(SignalKind::ChildDied),
                        None => break,
                    },
                }
            }
        })
    };

    Ok(OsListeners {
        token,
        tasks: vec![interrupts, children],
    })
}
