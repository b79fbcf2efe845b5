// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup Reconciler (spec §4.10). Order matters: the network port must be
//! bound before any forum side effect is attempted, so a crash-looping
//! instance never issues a delete/create call it can't back up by actually
//! serving traffic (spec P9/S6).

use tracing::{info, warn};

use crate::forum::{best_effort_close, best_effort_delete};
use crate::session::chrono_stub::Timestamp;
use crate::state::Coordinator;
use termio::TerminalAdapter;

/// `(chat, thread)` pairs collected from sessions whose pane no longer
/// exists, recorded for step (d)'s orphan-thread cleanup.
type Orphan = (String, String);

/// Load the snapshot and drop dead sessions from the in-memory table. Must
/// run before the port bind; performs no forum or network side effects.
pub async fn load_and_prune(coordinator: &Coordinator, adapter: &dyn TerminalAdapter) -> Vec<Orphan> {
    let store = coordinator.snapshot_store.clone();
    let snapshot = match tokio::task::spawn_blocking(move || store.load()).await {
        Ok(Ok(s)) => s,
        Ok(Err(e)) => {
            warn!(error = %e, "snapshot load failed, starting with an empty registry");
            return Vec::new();
        }
        Err(e) => {
            warn!(error = %e, "snapshot load task panicked, starting with an empty registry");
            return Vec::new();
        }
    };
    coordinator.restore_from_snapshot(snapshot, Timestamp::now()).await;

    let live_panes: std::collections::HashSet<String> = match adapter.list_panes().await {
        Ok(panes) => panes.into_iter().map(|p| p.name).collect(),
        Err(e) => {
            warn!(error = %e, "pane enumeration failed, treating no sessions as live");
            std::collections::HashSet::new()
        }
    };

    let mut orphans = Vec::new();
    for session in coordinator.registry.list().await {
        if live_panes.contains(&session.pane_name) {
            continue;
        }
        coordinator.registry.forget(&session.id).await;
        info!(session = session.id.as_str(), "dropped dead session at startup");
        if let (Some(chat), Some(thread)) = (session.chat_id, session.thread_id) {
            orphans.push((chat, thread));
        }
    }
    orphans
}

/// Step (d): runs only after the forum notifier has started and the port is
/// bound. Deletes orphan threads, backfills missing `chat_id`, creates
/// missing threads, and flushes deferred crash recoveries.
pub async fn finish_after_bind(coordinator: &Coordinator, orphans: Vec<Orphan>) {
    for (chat, thread) in orphans {
        best_effort_delete(coordinator.forum.as_ref(), &chat, &thread).await;
    }

    if let Some(default_chat) = coordinator.default_forum_chat.clone() {
        for session in coordinator.registry.list().await {
            if let Err(e) = coordinator.registry.backfill_chat_id(&session.id, &default_chat).await {
                warn!(session = session.id.as_str(), error = %e, "chat-id backfill failed");
            }
        }
    }

    for session in coordinator.registry.list().await {
        if session.thread_id.is_some() {
            continue;
        }
        let Some(chat) = session.chat_id.clone() else { continue };
        match coordinator.forum.create_thread(&chat, &format!("agent {}", session.id)).await {
            Ok(thread_id) => {
                if let Err(e) = coordinator.registry.set_thread_id(&session.id, thread_id).await {
                    warn!(session = session.id.as_str(), error = %e, "thread-id persist failed");
                }
            }
            Err(e) => warn!(session = session.id.as_str(), error = %e, "thread creation failed, continuing without one"),
        }
    }

    for session in coordinator.registry.list().await {
        coordinator.crash_recovery.flush_pending_recovery(&session.id).await;
    }

    coordinator.persist_now().await;
}

/// Best-effort close-and-notify for a session the caller has determined is
/// complete (spec §4.8: "close the thread and send a completed message").
pub async fn notify_session_completed(coordinator: &Coordinator, chat: &str, thread: &str) {
    best_effort_close(coordinator.forum.as_ref(), chat, thread).await;
    crate::forum::best_effort_send(coordinator.forum.as_ref(), chat, Some(thread), "Session completed").await;
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
