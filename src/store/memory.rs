//! In-process coordination store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CompletionFlag, CoordinationStore, RunStatus};
use crate::error::StoreError;

#[derive(Default)]
struct State {
    workers: Vec<String>,
    flags: HashMap<String, CompletionFlag>,
    ticks: Vec<u64>,
    statuses: Vec<RunStatus>,
    releases: usize,
}

/// Coordination store kept in memory.
///
/// Useful when workers are tasks of the same process, and in tests: the
/// published tick log and release count can be inspected.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose registry lists `workers` in order.
    pub fn with_workers<I, S>(workers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: RwLock::new(State {
                workers: workers.into_iter().map(Into::into).collect(),
                ..State::default()
            }),
        }
    }

    /// Appends a worker to the registry.
    pub async fn register(&self, name: impl Into<String>) {
        self.state.write().await.workers.push(name.into());
    }

    /// Every step published so far, in publication order.
    pub async fn ticks(&self) -> Vec<u64> {
        self.state.read().await.ticks.clone()
    }

    /// Every run-state transition published so far.
    pub async fn statuses(&self) -> Vec<RunStatus> {
        self.state.read().await.statuses.clone()
    }

    /// How many times `release` was called.
    pub async fn releases(&self) -> usize {
        self.state.read().await.releases
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn worker_list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.state.read().await.workers.clone())
    }

    async fn probe(&self, worker: &str) -> Result<CompletionFlag, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .flags
            .get(worker)
            .copied()
            .unwrap_or_default())
    }

    async fn set_flag(&self, worker: &str, flag: CompletionFlag) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .flags
            .insert(worker.to_string(), flag);
        Ok(())
    }

    async fn publish_tick(&self, step: u64) -> Result<(), StoreError> {
        self.state.write().await.ticks.push(step);
        Ok(())
    }

    async fn publish_status(&self, status: RunStatus) -> Result<(), StoreError> {
        self.state.write().await.statuses.push(status);
        Ok(())
    }

    async fn release(&self) -> Result<(), StoreError> {
        self.state.write().await.releases += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flags_default_to_idle_and_are_per_worker() {
        let store = MemoryStore::with_workers(["A", "B"]);
        assert_eq!(store.worker_list().await.unwrap(), vec!["A", "B"]);
        assert_eq!(store.probe("A").await.unwrap(), CompletionFlag::Idle);

        store.set_flag("A", CompletionFlag::Busy).await.unwrap();
        assert_eq!(store.probe("A").await.unwrap(), CompletionFlag::Busy);
        assert_eq!(store.probe("B").await.unwrap(), CompletionFlag::Idle);

        store.register("C").await;
        assert_eq!(store.worker_list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn records_ticks_and_releases() {
        let store = MemoryStore::new();
        for step in 0..3 {
            store.publish_tick(step).await.unwrap();
        }
        store.release().await.unwrap();
        assert_eq!(store.ticks().await, vec![0, 1, 2]);
        assert_eq!(store.releases().await, 1);
    }
}
