// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Skip fence: reconciles the stop hooks that `sm clear` is known to trigger
//! as a side effect, so a context-clear doesn't look like a real completion
//! to watchers, reminders, or back-notification.

use std::sync::Arc;

use tracing::{info, warn};

use crate::session::SessionStatus;

use super::MessageQueue;

/// Which of `mark_session_idle`'s three branches fired. Crash recovery's
/// deferred flush (spec §4.6) only runs on a real completion — a handoff or
/// an absorbed stop hook must leave `pending-recovery` untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleTransition {
    Handoff,
    Absorbed,
    RealCompletion,
}

impl MessageQueue {
    /// `Registry.mark_active(id)`'s delivery-state half (spec §4.3
    /// pre-tool-use): clears the idle flag so a watcher or a pending-message
    /// delivery doesn't treat the session as still idle.
    pub async fn mark_active(&self, session_id: &str) {
        self.state_for(session_id).await.write().await.is_idle = false;
    }

    /// `cache-invalidate(id)`: arms the fence, clears stale delivery-state
    /// fields the caller (`sm clear`) is responsible for resetting.
    /// Returns the number of slots armed (1 or 2, spec P4).
    pub async fn cache_invalidate(&self, session_id: &str, now: crate::session::chrono_stub::Timestamp) -> u32 {
        let state_arc = self.state_for(session_id).await;
        let session_running = self.registry.get(session_id).await.map(|s| s.status == SessionStatus::Running).unwrap_or(false);

        let mut state = state_arc.write().await;
        let two_slots = !state.is_idle && session_running;
        let slots = if two_slots { 2 } else { 1 };

        state.stop_notify_skip_count = slots;
        state.skip_count_armed_at = Some(now);
        state.stop_notify_sender_id = None;
        state.pending.retain(|m| !m.notify_on_stop);
        info!(session = session_id, slots, "skip fence armed");
        slots
    }

    /// `mark_session_idle(id, from_stop_hook=true)` (spec §4.4 step list).
    /// Dispatches, in order: handoff precedence, fence absorption, then
    /// real-completion fallthrough.
    pub async fn mark_session_idle(self: &Arc<Self>, session_id: &str, now: crate::session::chrono_stub::Timestamp) -> IdleTransition {
        let state_arc = self.state_for(session_id).await;

        let handoff_path = { state_arc.read().await.pending_handoff_path.clone() };
        if let Some(path) = handoff_path {
            self.execute_handoff(session_id, &path).await;
            let mut state = state_arc.write().await;
            state.is_idle = false;
            state.pending_handoff_path = None;
            return IdleTransition::Handoff;
        }

        let absorbed = {
            let mut state = state_arc.write().await;
            let within_window = state
                .skip_count_armed_at
                .map(|armed_at| now.epoch_ms().saturating_sub(armed_at.epoch_ms()) < self.skip_fence_window.as_millis() as u64)
                .unwrap_or(false);
            if state.stop_notify_skip_count > 0 && within_window {
                state.stop_notify_skip_count -= 1;
                true
            } else {
                if state.stop_notify_skip_count > 0 {
                    warn!(session = session_id, "skip fence stale, falling through to real completion");
                    state.stop_notify_skip_count = 0;
                    state.skip_count_armed_at = None;
                }
                false
            }
        };

        if absorbed {
            info!(session = session_id, "stop hook absorbed by skip fence");
            self.schedule_try_deliver(session_id).await;
            return IdleTransition::Absorbed;
        }

        // Real completion: cancel timers, set idle, promote, notify, deliver.
        self.cancel_remind(session_id).await;
        self.cancel_parent_wake(session_id).await;

        let promoted_sender = {
            let mut state = state_arc.write().await;
            state.is_idle = true;
            state.last_idle_at = Some(now);
            let promoted = state.paste_buffered_notify_sender_id.take();
            if promoted.is_some() {
                state.stop_notify_sender_id = promoted.clone();
            }
            promoted
        };

        if let Some(sender_id) = state_arc.read().await.stop_notify_sender_id.clone() {
            if self.registry.get(&sender_id).await.is_some() {
                self.queue_message(crate::queue::QueueRequest {
                    target: sender_id,
                    sender: None,
                    sender_name: "coordinator".to_owned(),
                    text: "[agent stopped]".to_owned(),
                    mode: crate::queue::DeliveryMode::Sequential,
                    notify_on_stop: false,
                    notify_on_delivery: false,
                    timeout_seconds: None,
                    post_delivery_delay: None,
                }, now)
                .await;
            } else {
                warn!(session = session_id, "stop-notify sender vanished, dropping back-notification");
            }
        }
        let _ = promoted_sender;

        self.schedule_try_deliver(session_id).await;
        IdleTransition::RealCompletion
    }
}

#[cfg(test)]
#[path = "skip_fence_tests.rs"]
mod tests;
