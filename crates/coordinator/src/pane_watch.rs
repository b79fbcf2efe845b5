// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pane Output Monitor poll loop (spec §4.2): the only caller of
//! [`termio::PaneMonitor::poll_once`]. Runs for the process lifetime,
//! dispatching classified events to crash recovery and, for providers with
//! no stop hook, to idle detection directly.

use std::sync::Arc;
use std::time::Duration;

use termio::ClassifiedEvent;
use tracing::warn;

use crate::session::{chrono_stub::Timestamp, IdleDetectionStrategy};
use crate::state::Coordinator;

/// Poll every known session's pane once per `poll_interval`, forever. Has
/// no shutdown path of its own — it's spawned detached and dies with the
/// process, matching the watcher/reminder task loops.
pub async fn run_pane_watch(coordinator: Arc<Coordinator>, poll_interval: Duration) {
    loop {
        tokio::time::sleep(poll_interval).await;

        let sessions = coordinator.registry.list().await;
        for session in sessions {
            let events = coordinator.pane_monitor.poll_once(&session.pane_name).await;
            for event in events {
                dispatch_event(&coordinator, &session.id, &session.provider.caps().idle_detection_strategy, event).await;
            }
        }
    }
}

async fn dispatch_event(coordinator: &Coordinator, session_id: &str, idle_strategy: &IdleDetectionStrategy, event: ClassifiedEvent) {
    match event {
        ClassifiedEvent::CrashSignature { snippet } => {
            warn!(session = session_id, snippet = snippet.as_str(), "crash signature detected in pane output");
            coordinator.crash_recovery.on_crash_detected(session_id).await;
        }
        ClassifiedEvent::PermissionPrompt => {
            coordinator.crash_recovery.mark_awaiting_permission(session_id).await;
        }
        ClassifiedEvent::Idle | ClassifiedEvent::Completion => {
            // Providers with a real stop hook get their idle transition from
            // there; this path only matters for PromptSignature providers.
            if *idle_strategy == IdleDetectionStrategy::PromptSignature {
                coordinator.queue.mark_session_idle(session_id, Timestamp::now()).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "pane_watch_tests.rs"]
mod tests;
