// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message Queue (spec §4.4): per-session FIFO queues, an idle-gated
//! delivery engine, the skip fence, watchers, reminders, parent-wake
//! digests, and handoff chaining. Largest subsystem; split by concern
//! across sibling modules, all operating on the shared [`SessionDeliveryState`]
//! table owned here.

pub mod delivery;
pub mod handoff;
pub mod parent_wake;
pub mod reminders;
pub mod skip_fence;
pub mod watchers;

pub use delivery::{QueueOutcome, QueueRequest};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::forum::ForumNotifier;
use crate::registry::SessionRegistry;
use crate::session::chrono_stub::Timestamp;
use termio::TerminalAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    Sequential,
    Important,
    Urgent,
    Steer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: Uuid,
    pub target: String,
    pub sender: Option<String>,
    pub sender_name: String,
    pub text: String,
    pub mode: DeliveryMode,
    pub queued_at: Timestamp,
    pub timeout_deadline: Option<Timestamp>,
    pub notify_on_stop: bool,
    pub notify_on_delivery: bool,
    pub post_delivery_delay: Option<std::time::Duration>,
    pub delivered_at: Option<Timestamp>,
}

/// Short id used in `[From <name> (<short-id>)]` batch headers.
pub fn short_id(id: &str) -> &str {
    &id[..id.len().min(7)]
}

/// Per-session runtime delivery state (spec §3 `SessionDeliveryState`).
/// Created lazily on first queue/delivery interaction with a session.
#[derive(Debug, Default)]
pub struct SessionDeliveryState {
    pub is_idle: bool,
    pub last_idle_at: Option<Timestamp>,
    pub pending: VecDeque<QueuedMessage>,
    pub saved_user_input: Option<String>,
    pub pending_user_input: Option<(String, Timestamp)>,
    pub stop_notify_sender_id: Option<String>,
    pub paste_buffered_notify_sender_id: Option<String>,
    pub pending_handoff_path: Option<String>,
    pub stop_notify_skip_count: u32,
    pub skip_count_armed_at: Option<Timestamp>,
    pub delivery_in_flight: bool,
}

/// Handles tied to a session's background tasks, so cancellation (spec §5)
/// is explicit and idempotent.
#[derive(Default)]
pub struct SessionTasks {
    pub remind: Option<CancellationToken>,
    pub parent_wake: Option<CancellationToken>,
    pub watchers: Vec<CancellationToken>,
}

pub struct MessageQueue {
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) adapter: Arc<dyn TerminalAdapter>,
    pub(crate) forum: Arc<dyn ForumNotifier>,
    pub(crate) audit: Arc<AuditLog>,
    pub(crate) states: RwLock<HashMap<String, Arc<RwLock<SessionDeliveryState>>>>,
    pub(crate) tasks: RwLock<HashMap<String, SessionTasks>>,
    pub(crate) reminders: RwLock<HashMap<String, reminders::RemindRegistration>>,
    pub(crate) parent_wakes: RwLock<HashMap<String, parent_wake::ParentWakeRegistration>>,
    pub(crate) input_poll_interval: std::time::Duration,
    pub(crate) input_stale_timeout: std::time::Duration,
    pub(crate) skip_fence_window: std::time::Duration,
    pub(crate) remind_soft: std::time::Duration,
    pub(crate) remind_hard: std::time::Duration,
}

pub struct MessageQueueConfig {
    pub input_poll_interval: std::time::Duration,
    pub input_stale_timeout: std::time::Duration,
    pub skip_fence_window: std::time::Duration,
    pub remind_soft: std::time::Duration,
    pub remind_hard: std::time::Duration,
}

impl MessageQueue {
    pub fn new(
        registry: Arc<SessionRegistry>,
        adapter: Arc<dyn TerminalAdapter>,
        forum: Arc<dyn ForumNotifier>,
        audit: Arc<AuditLog>,
        config: MessageQueueConfig,
    ) -> Self {
        Self {
            registry,
            adapter,
            forum,
            audit,
            states: RwLock::new(HashMap::new()),
            tasks: RwLock::new(HashMap::new()),
            reminders: RwLock::new(HashMap::new()),
            parent_wakes: RwLock::new(HashMap::new()),
            input_poll_interval: config.input_poll_interval,
            input_stale_timeout: config.input_stale_timeout,
            skip_fence_window: config.skip_fence_window,
            remind_soft: config.remind_soft,
            remind_hard: config.remind_hard,
        }
    }

    pub async fn state_for(&self, session_id: &str) -> Arc<RwLock<SessionDeliveryState>> {
        {
            let states = self.states.read().await;
            if let Some(state) = states.get(session_id) {
                return state.clone();
            }
        }
        let mut states = self.states.write().await;
        states.entry(session_id.to_owned()).or_insert_with(|| Arc::new(RwLock::new(SessionDeliveryState::default()))).clone()
    }

    pub async fn is_idle(&self, session_id: &str) -> bool {
        self.state_for(session_id).await.read().await.is_idle
    }

    pub async fn pending_count(&self, session_id: &str) -> usize {
        self.state_for(session_id).await.read().await.pending.len()
    }
}
