// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook Endpoint business logic (spec §4.3). Handlers here never propagate
//! errors to the caller (spec §7): a missing or unknown session is logged
//! and the call returns, it never surfaces as a 4xx/5xx to the hook script.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::audit::is_destructive_tool;
use crate::session::chrono_stub::Timestamp;
use crate::transcript::last_assistant_message;

/// Event kinds accepted by `POST /hooks/agent` (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookEvent {
    PreToolUse,
    PostToolUse,
    Stop,
    PreCompact,
    SessionStartAfterCompact,
}

/// Wire payload for `POST /hooks/agent`, a superset of the fields any event
/// kind may carry. Fields not relevant to a given `event` are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookPayload {
    pub event: HookEvent,
    pub session_id: String,
    #[serde(default)]
    pub transcript_path: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<serde_json::Value>,
    #[serde(default)]
    pub tool_response: Option<serde_json::Value>,
    #[serde(default)]
    pub tool_use_id: Option<String>,
}

/// Outcome of a hook callback, returned to the hook script via the HTTP
/// response body (spec §4.7: destructive tools dispatched by hooks are
/// gated on workspace-lock ownership). The response status is always 200
/// (spec §7 fire-and-forget contract) — a block is carried in the body, not
/// the status code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum HookDecision {
    Allow,
    Block { reason: String },
}

/// Hook-local bookkeeping that doesn't belong to the delivery engine: the
/// last assistant message seen per session, and sessions whose stop hook
/// fired before a message was available.
#[derive(Default)]
pub struct HookState {
    last_claude_output: RwLock<HashMap<String, String>>,
    pending_stop_notifications: RwLock<HashSet<String>>,
}

impl HookState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn last_output(&self, session_id: &str) -> Option<String> {
        self.last_claude_output.read().await.get(session_id).cloned()
    }

    pub async fn is_pending_stop_notification(&self, session_id: &str) -> bool {
        self.pending_stop_notifications.read().await.contains(session_id)
    }

    async fn record_output(&self, session_id: &str, text: String) {
        self.last_claude_output.write().await.insert(session_id.to_owned(), text);
        self.pending_stop_notifications.write().await.remove(session_id);
    }

    pub async fn clear_output(&self, session_id: &str) {
        self.last_claude_output.write().await.remove(session_id);
    }
}

/// Dispatch a hook callback to the handler for its event kind. The single
/// entry point the HTTP layer calls (spec §4.3).
pub async fn dispatch_hook(coordinator: &crate::state::Coordinator, payload: HookPayload, now: Timestamp) -> HookDecision {
    match payload.event {
        HookEvent::PreToolUse => handle_pre_tool_use(coordinator, &payload, now).await,
        HookEvent::PostToolUse => {
            handle_post_tool_use(coordinator, &payload, now).await;
            HookDecision::Allow
        }
        HookEvent::Stop => {
            handle_stop(coordinator, &payload, now).await;
            HookDecision::Allow
        }
        HookEvent::PreCompact => {
            handle_pre_compact(coordinator, &payload).await;
            HookDecision::Allow
        }
        HookEvent::SessionStartAfterCompact => {
            handle_session_start_after_compact(coordinator, &payload, now).await;
            HookDecision::Allow
        }
    }
}

/// `pre-tool-use`: mark the session active, record the tool call in the
/// audit log. Destructive tools are blocked if the session's working
/// directory is locked by a different session (spec §4.7).
async fn handle_pre_tool_use(coordinator: &crate::state::Coordinator, payload: &HookPayload, now: Timestamp) -> HookDecision {
    let Some(session) = coordinator.registry.get(&payload.session_id).await else {
        warn!(session = payload.session_id.as_str(), "pre-tool-use for unknown session, ignoring");
        return HookDecision::Allow;
    };

    let tool_name = payload.tool_name.as_deref().unwrap_or("unknown");
    if is_destructive_tool(tool_name) {
        if let Some(owner) = coordinator.workspace_locks.owner_of(&session.working_dir).await {
            if owner != payload.session_id {
                warn!(session = payload.session_id.as_str(), owner = owner.as_str(), tool = tool_name, "destructive tool blocked, workspace locked");
                return HookDecision::Block { reason: format!("workspace locked by {owner}") };
            }
        }
    }

    if let Err(e) = coordinator.registry.update_status(&payload.session_id, crate::session::SessionStatus::Running).await {
        warn!(session = payload.session_id.as_str(), error = %e, "pre-tool-use status update failed");
    }
    if let Err(e) = coordinator.registry.touch_last_tool_call(&payload.session_id, now).await {
        warn!(session = payload.session_id.as_str(), error = %e, "pre-tool-use last-tool-call update failed");
    }
    coordinator.queue.mark_active(&payload.session_id).await;
    coordinator.crash_recovery.clear_awaiting_permission(&payload.session_id).await;

    let tool_input = payload.tool_input.clone().unwrap_or(serde_json::Value::Null);
    let tool_use_id = payload.tool_use_id.as_deref().unwrap_or("");
    let cwd = payload.cwd.as_deref().unwrap_or("");
    coordinator.audit.record(&payload.session_id, tool_name, tool_input, tool_use_id, cwd, now).await;
    HookDecision::Allow
}

/// `post-tool-use`: update `last-tool-call`, and if the transcript now
/// carries a final assistant message, cache it (spec §4.3).
async fn handle_post_tool_use(coordinator: &crate::state::Coordinator, payload: &HookPayload, now: Timestamp) {
    if coordinator.registry.get(&payload.session_id).await.is_none() {
        warn!(session = payload.session_id.as_str(), "post-tool-use for unknown session, ignoring");
        return;
    }
    if let Err(e) = coordinator.registry.touch_last_tool_call(&payload.session_id, now).await {
        warn!(session = payload.session_id.as_str(), error = %e, "post-tool-use last-tool-call update failed");
    }
    let Some(path) = &payload.transcript_path else { return };
    if let Some(text) = last_assistant_message(path).await {
        coordinator.hooks.record_output(&payload.session_id, text).await;
    }
}

/// `stop`: capture the transcript's last message before delegating to
/// `mark_session_idle`; if no message is available yet, defer the session
/// onto `pending-stop-notifications` until a later event supplies one.
async fn handle_stop(coordinator: &crate::state::Coordinator, payload: &HookPayload, now: Timestamp) {
    if coordinator.registry.get(&payload.session_id).await.is_none() {
        warn!(session = payload.session_id.as_str(), "stop hook for unknown session, ignoring");
        return;
    }

    let message = match &payload.transcript_path {
        Some(path) => last_assistant_message(path).await,
        None => None,
    };
    match message {
        Some(text) => coordinator.hooks.record_output(&payload.session_id, text).await,
        None => {
            coordinator.hooks.pending_stop_notifications.write().await.insert(payload.session_id.clone());
        }
    }

    let transition = coordinator.queue.mark_session_idle(&payload.session_id, now).await;
    if transition == crate::queue::skip_fence::IdleTransition::RealCompletion {
        coordinator.crash_recovery.flush_pending_recovery(&payload.session_id).await;
    }
}

/// `pre-compact`: mark the session as compacting so reminders bounded-wait
/// instead of firing mid-compaction (spec §4.5).
async fn handle_pre_compact(coordinator: &crate::state::Coordinator, payload: &HookPayload) {
    if let Err(e) = coordinator.registry.set_compacting(&payload.session_id, true).await {
        warn!(session = payload.session_id.as_str(), error = %e, "pre-compact flag update failed");
    }
}

/// `session-start-after-compact`: clear the compacting flag, drop the stale
/// cached output (compaction truncates the transcript it was read from),
/// and reset the reminder timer (spec §4.5).
async fn handle_session_start_after_compact(coordinator: &crate::state::Coordinator, payload: &HookPayload, now: Timestamp) {
    if let Err(e) = coordinator.registry.set_compacting(&payload.session_id, false).await {
        warn!(session = payload.session_id.as_str(), error = %e, "session-start-after-compact flag update failed");
    }
    coordinator.hooks.clear_output(&payload.session_id).await;
    coordinator.queue.reset_remind_timer(&payload.session_id, now).await;
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
