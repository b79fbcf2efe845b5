// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace Lock Manager (spec §4.7): single-writer lock per working
//! directory, queried by the Registry before destructive file operations
//! dispatched by hooks.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::session::chrono_stub::Timestamp;

#[derive(Debug, Clone)]
pub struct WorkspaceLock {
    pub owner: String,
    pub reason: String,
    pub acquired_at: Timestamp,
}

#[derive(Default)]
pub struct WorkspaceLockManager {
    locks: RwLock<HashMap<String, WorkspaceLock>>,
}

impl WorkspaceLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Succeeds only if `wd` is currently unowned.
    pub async fn lock(&self, wd: &str, owner: &str, reason: &str, now: Timestamp) -> bool {
        let mut locks = self.locks.write().await;
        if locks.contains_key(wd) {
            return false;
        }
        locks.insert(
            wd.to_owned(),
            WorkspaceLock { owner: owner.to_owned(), reason: reason.to_owned(), acquired_at: now },
        );
        true
    }

    /// Releases only if `owner` currently holds `wd`.
    pub async fn unlock(&self, wd: &str, owner: &str) -> bool {
        let mut locks = self.locks.write().await;
        match locks.get(wd) {
            Some(lock) if lock.owner == owner => {
                locks.remove(wd);
                true
            }
            _ => false,
        }
    }

    pub async fn owner_of(&self, wd: &str) -> Option<String> {
        self.locks.read().await.get(wd).map(|l| l.owner.clone())
    }
}

#[cfg(test)]
#[path = "workspace_lock_tests.rs"]
mod tests;
