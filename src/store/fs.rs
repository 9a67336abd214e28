//! Directory-backed coordination store.
//!
//! ## Layout
//! ```text
//! <root>/
//!   workers            one worker name per line ('#' starts a comment)
//!   flags/<name>       "busy" | "idle"   (absent = idle; replaced atomically)
//!   ticks              "<step>\t<unix_micros>" per line, append-only
//!   status             "<unix_micros>\t<status>" per line, append-only
//!   scheduler.lock     pid of the owning scheduler (created exclusively)
//! ```

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{CompletionFlag, CoordinationStore, RunStatus};
use crate::error::StoreError;

const WORKERS: &str = "workers";
const FLAGS: &str = "flags";
const TICKS: &str = "ticks";
const STATUS: &str = "status";
const LOCK: &str = "scheduler.lock";

/// Coordination store kept in a directory on a local filesystem.
///
/// The scheduler opens it with [`FsStore::open`], which takes the lock file;
/// workers use [`FsStore::connect`], which does not.
pub struct FsStore {
    root: PathBuf,
    owns_lock: bool,
    ticks: Mutex<Option<File>>,
}

impl FsStore {
    /// Opens the store as its scheduler: creates the layout and takes the lock.
    ///
    /// Fails with [`StoreError::Locked`] if another scheduler holds it.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(root.join(FLAGS))?;

        let lock = root.join(LOCK);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock)
        {
            Ok(mut f) => writeln!(f, "{}", std::process::id())?,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::Locked {
                    path: lock.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            root,
            owns_lock: true,
            ticks: Mutex::new(None),
        })
    }

    /// Connects as a worker (no lock, no layout changes).
    pub fn connect(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            owns_lock: false,
            ticks: Mutex::new(None),
        }
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn flag_path(&self, worker: &str) -> Result<PathBuf, StoreError> {
        let valid = !worker.is_empty()
            && worker != "."
            && worker != ".."
            && !worker.contains(['/', '\0']);
        if !valid {
            return Err(StoreError::InvalidName(worker.to_string()));
        }
        Ok(self.root.join(FLAGS).join(worker))
    }
}

fn unix_micros() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros())
        .unwrap_or_default()
}

#[async_trait]
impl CoordinationStore for FsStore {
    async fn worker_list(&self) -> Result<Vec<String>, StoreError> {
        let raw = match fs::read_to_string(self.root.join(WORKERS)).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(raw
            .lines()
            .map(|l| l.split('#').next().unwrap_or_default().trim())
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn probe(&self, worker: &str) -> Result<CompletionFlag, StoreError> {
        let path = self.flag_path(worker)?;
        match fs::read_to_string(&path).await {
            Ok(v) => v.parse().map_err(|()| StoreError::Malformed {
                key: worker.to_string(),
                value: v,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(CompletionFlag::Idle),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_flag(&self, worker: &str, flag: CompletionFlag) -> Result<(), StoreError> {
        let path = self.flag_path(worker)?;
        let dir = self.root.join(FLAGS);
        std::fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(flag.as_str().as_bytes())?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    async fn publish_tick(&self, step: u64) -> Result<(), StoreError> {
        let mut guard = self.ticks.lock().await;
        let mut file = match guard.take() {
            Some(f) => f,
            None => {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(self.root.join(TICKS))
                    .await?
            }
        };
        file.write_all(format!("{step}\t{}\n", unix_micros()).as_bytes())
            .await?;
        file.flush().await?;
        *guard = Some(file);
        Ok(())
    }

    async fn publish_status(&self, status: RunStatus) -> Result<(), StoreError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(STATUS))
            .await?;
        file.write_all(format!("{}\t{status}\n", unix_micros()).as_bytes())
            .await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn release(&self) -> Result<(), StoreError> {
        if let Some(mut f) = self.ticks.lock().await.take() {
            f.sync_data().await?;
        }
        if !self.owns_lock {
            return Ok(());
        }
        match fs::remove_file(self.root.join(LOCK)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
