// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The coordinator value (spec §9 "explicit coordinator value constructed
//! once at startup"): threads the Registry, Message Queue, audit log, forum
//! notifier, workspace locks, snapshot store, crash recovery engine, and
//! review orchestrator together. Hook and RPC handlers receive it by
//! parameter; there is no ambient singleton access.

use std::sync::Arc;

use tracing::warn;

use crate::audit::AuditLog;
use crate::config::Config;
use crate::crash_recovery::CrashRecoveryEngine;
use crate::forum::ForumNotifier;
use crate::hooks::HookState;
use crate::queue::{MessageQueue, MessageQueueConfig};
use crate::registry::{EmTopic, SessionRegistry};
use crate::review::{ReviewOrchestrator, ReviewSettleTimings};
use crate::snapshot::{EmTopicSnapshot, Snapshot, SnapshotStore};
use crate::workspace_lock::WorkspaceLockManager;
use termio::{PaneMonitor, PaneMonitorConfig, TerminalAdapter};

/// Pane Output Monitor capture depth (spec §4.2): enough to catch a crash
/// dump or a permission prompt without re-scanning the whole scrollback.
const PANE_MONITOR_CAPTURE_LINES: usize = 200;

pub struct Coordinator {
    pub registry: Arc<SessionRegistry>,
    pub queue: Arc<MessageQueue>,
    pub audit: Arc<AuditLog>,
    pub forum: Arc<dyn ForumNotifier>,
    pub workspace_locks: Arc<WorkspaceLockManager>,
    pub crash_recovery: Arc<CrashRecoveryEngine>,
    pub review: Arc<ReviewOrchestrator>,
    pub snapshot_store: Arc<SnapshotStore>,
    pub pane_monitor: Arc<PaneMonitor>,
    pub hooks: HookState,
    pub default_forum_chat: Option<String>,
}

impl Coordinator {
    pub fn new(config: &Config, adapter: Arc<dyn TerminalAdapter>, forum: Arc<dyn ForumNotifier>) -> Self {
        let registry = Arc::new(SessionRegistry::new(adapter.clone()));
        let audit = Arc::new(AuditLog::new(Some(&config.audit_dir)));

        let queue = Arc::new(MessageQueue::new(
            registry.clone(),
            adapter.clone(),
            forum.clone(),
            audit.clone(),
            MessageQueueConfig {
                input_poll_interval: config.input_poll_interval(),
                input_stale_timeout: config.input_stale_timeout(),
                skip_fence_window: config.skip_fence_window(),
                remind_soft: config.remind_soft(),
                remind_hard: config.remind_hard(),
            },
        ));

        let review = Arc::new(ReviewOrchestrator::new(
            adapter.clone(),
            registry.clone(),
            ReviewSettleTimings {
                menu_settle: std::time::Duration::from_secs_f64(config.review_menu_settle_seconds),
                branch_settle: std::time::Duration::from_secs_f64(config.review_branch_settle_seconds),
                steer_delay: std::time::Duration::from_secs_f64(config.review_steer_delay_seconds),
            },
        ));

        let pane_monitor = Arc::new(PaneMonitor::new(
            adapter.clone(),
            PaneMonitorConfig {
                poll_interval: config.watch_poll_interval(),
                idle_timeout: config.idle_timeout(),
                capture_lines: PANE_MONITOR_CAPTURE_LINES,
            },
        ));

        Self {
            registry: registry.clone(),
            queue,
            audit,
            forum,
            workspace_locks: Arc::new(WorkspaceLockManager::new()),
            crash_recovery: Arc::new(CrashRecoveryEngine::new(registry, adapter)),
            review,
            snapshot_store: Arc::new(SnapshotStore::new(config.state_file.clone())),
            pane_monitor,
            hooks: HookState::new(),
            default_forum_chat: config.default_forum_chat.clone(),
        }
    }

    /// Assemble the full persisted snapshot (spec §6 layout) from live
    /// in-memory state.
    pub async fn to_snapshot(&self) -> Snapshot {
        let em_topic = self.registry.em_topic.read().await.clone();
        Snapshot {
            sessions: self.registry.list().await,
            em_topic: Some(EmTopicSnapshot { chat: em_topic.chat, thread: em_topic.thread }),
            parent_wake_registrations: self.queue.snapshot_parent_wakes().await,
            reminders: self.queue.snapshot_reminders().await,
        }
    }

    pub fn save_snapshot_best_effort(&self, snapshot: &Snapshot) {
        self.snapshot_store.save_best_effort(snapshot);
    }

    /// Restore in-memory state from a loaded snapshot (pane liveness check
    /// is the Startup Reconciler's job, spec §4.10 step b).
    pub async fn restore_from_snapshot(&self, snapshot: Snapshot, now: crate::session::chrono_stub::Timestamp) {
        self.registry.restore_sessions(snapshot.sessions).await;
        if let Some(topic) = snapshot.em_topic {
            self.registry.restore_em_topic(EmTopic { chat: topic.chat, thread: topic.thread }).await;
        }
        self.queue.restore_reminders(snapshot.reminders, now).await;
        self.queue.restore_parent_wakes(snapshot.parent_wake_registrations, now).await;
    }

    /// Dispatches the write to the blocking pool (spec §5: file I/O never
    /// runs on the event loop).
    pub async fn persist_now(&self) {
        let snapshot = self.to_snapshot().await;
        let store = self.snapshot_store.clone();
        match tokio::task::spawn_blocking(move || store.save(&snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "immediate snapshot write failed"),
            Err(e) => warn!(error = %e, "snapshot write task panicked"),
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
