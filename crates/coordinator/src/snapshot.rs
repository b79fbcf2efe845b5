// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted state snapshot (spec §6): a single JSON file, written
//! atomically (tmp + rename) under a process-level advisory lock held for
//! the duration of the write, so a concurrent instance can never observe a
//! half-written file or interleave two writers.

use std::fs::File;
use std::path::{Path, PathBuf};

use rustix::fs::{flock, FlockOperation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::queue::reminders::RemindRegistration;
use crate::queue::parent_wake::ParentWakeRegistration;
use crate::session::Session;

/// Top-level snapshot layout (spec §6).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub sessions: Vec<Session>,
    pub em_topic: Option<EmTopicSnapshot>,
    pub parent_wake_registrations: Vec<ParentWakeRegistration>,
    pub reminders: Vec<RemindRegistration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmTopicSnapshot {
    pub chat: Option<String>,
    pub thread: Option<String>,
}

/// Holds an advisory lock on the snapshot file for the duration of one write.
struct SnapshotFileLock {
    _file: File,
}

impl SnapshotFileLock {
    fn acquire(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::OpenOptions::new().create(true).write(true).open(path)?;
        flock(&file, FlockOperation::LockExclusive)?;
        Ok(Self { _file: file })
    }
}

impl Drop for SnapshotFileLock {
    fn drop(&mut self) {
        let _ = flock(&self._file, FlockOperation::Unlock);
    }
}

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> anyhow::Result<Snapshot> {
        if !self.path.exists() {
            return Ok(Snapshot::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write the full snapshot atomically under the process-level file lock.
    /// Used both for periodic background snapshotting and for
    /// must-persist-immediately fields like `telegram-thread-id`.
    pub fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let lock_path = self.path.with_extension("lock");
        let _lock = SnapshotFileLock::acquire(&lock_path)?;

        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Best-effort save that logs rather than propagates; used by the
    /// background snapshotter so a transient I/O error never takes down a
    /// request handler.
    pub fn save_best_effort(&self, snapshot: &Snapshot) {
        if let Err(e) = self.save(snapshot) {
            warn!(error = %e, "snapshot write failed");
        }
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
