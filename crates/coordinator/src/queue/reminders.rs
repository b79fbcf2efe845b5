// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reminder scheduler (spec §4.5): at most one active registration per
//! child, soft/hard nudge ladder, bounded wait while compacting.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::session::chrono_stub::Timestamp;

use super::{DeliveryMode, MessageQueue, QueueRequest};

/// Cap on the bounded wait applied while `is-compacting` is set.
const COMPACT_WAIT_CAP: Duration = Duration::from_secs(300);
const COMPACT_POLL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindRegistration {
    pub child: String,
    pub soft_period_seconds: u64,
    pub hard_period_seconds: u64,
    pub active: bool,
    pub created_at: Timestamp,
}

impl MessageQueue {
    /// At most one active registration per child; re-registering replaces
    /// the prior one (its task observes `is-active = false` on next wake
    /// and exits).
    pub async fn register_periodic_remind(self: &Arc<Self>, child: &str, soft: Duration, hard: Duration, now: Timestamp) {
        self.cancel_remind(child).await;

        let registration = RemindRegistration {
            child: child.to_owned(),
            soft_period_seconds: soft.as_secs(),
            hard_period_seconds: hard.as_secs(),
            active: true,
            created_at: now,
        };
        self.reminders.write().await.insert(child.to_owned(), registration);

        let cancel = CancellationToken::new();
        {
            let mut tasks = self.tasks.write().await;
            tasks.entry(child.to_owned()).or_default().remind = Some(cancel.clone());
        }

        let queue = self.clone();
        let child = child.to_owned();
        tokio::spawn(async move {
            queue.run_remind_task(child, soft, hard, cancel).await;
        });
    }

    async fn run_remind_task(self: Arc<Self>, child: String, soft: Duration, hard: Duration, cancel: CancellationToken) {
        let registered_at = self.reminders.read().await.get(&child).map(|r| r.created_at);

        if self.bounded_wait(&child, soft, &cancel).await.is_cancelled() {
            return;
        }
        if !self.is_registration_active(&child).await {
            return;
        }
        let status_called_since_register = match self.registry.get(&child).await.and_then(|s| s.status_text) {
            Some(st) => match registered_at {
                Some(registered) => st.at >= registered,
                None => true,
            },
            None => false,
        };
        if !status_called_since_register {
            self.send_remind(&child, "[remind] Update your status: sm status \"message\" — or if done: sm task-complete").await;
        }

        if self.bounded_wait(&child, hard.saturating_sub(soft), &cancel).await.is_cancelled() {
            return;
        }
        if !self.is_registration_active(&child).await {
            return;
        }
        self.send_remind(&child, "[remind] Status overdue.").await;
        self.reminders.write().await.remove(&child);
    }

    /// Sleep for `duration`, but while the session is compacting, poll in
    /// `COMPACT_POLL` slices up to `COMPACT_WAIT_CAP` instead of a flat sleep.
    async fn bounded_wait(&self, child: &str, duration: Duration, cancel: &CancellationToken) -> WaitOutcome {
        let deadline = Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return WaitOutcome::Elapsed;
            }
            let compacting = self.registry.get(child).await.map(|s| s.is_compacting).unwrap_or(false);
            let slice = if compacting { remaining.min(COMPACT_POLL).min(COMPACT_WAIT_CAP) } else { remaining };
            tokio::select! {
                _ = tokio::time::sleep(slice) => {}
                _ = cancel.cancelled() => return WaitOutcome::Cancelled,
            }
        }
    }

    async fn is_registration_active(&self, child: &str) -> bool {
        self.reminders.read().await.get(child).map(|r| r.active).unwrap_or(false)
    }

    async fn send_remind(self: &Arc<Self>, child: &str, text: &str) {
        let _ = self
            .queue_message(
                QueueRequest {
                    target: child.to_owned(),
                    sender: None,
                    sender_name: "coordinator".to_owned(),
                    text: text.to_owned(),
                    mode: DeliveryMode::Important,
                    notify_on_stop: false,
                    notify_on_delivery: false,
                    timeout_seconds: None,
                    post_delivery_delay: None,
                },
                Timestamp::now(),
            )
            .await;
    }

    /// Idempotent: marks the registration inactive and signals the owning
    /// task to exit on its next wake (spec §5 cancellation semantics).
    pub async fn cancel_remind(&self, child: &str) {
        if let Some(reg) = self.reminders.write().await.get_mut(child) {
            reg.active = false;
        }
        if let Some(tasks) = self.tasks.write().await.get_mut(child) {
            if let Some(cancel) = tasks.remind.take() {
                cancel.cancel();
            }
        }
    }

    /// Reset the timer (spec §4.5 "sm status call resets the timer"):
    /// re-registers with the same periods.
    pub async fn reset_remind_timer(self: &Arc<Self>, child: &str, now: Timestamp) {
        let existing = self.reminders.read().await.get(child).cloned();
        if let Some(reg) = existing {
            self.register_periodic_remind(
                child,
                Duration::from_secs(reg.soft_period_seconds),
                Duration::from_secs(reg.hard_period_seconds),
                now,
            )
            .await;
        }
    }

    /// Current registrations for snapshot persistence (spec §6 layout).
    pub async fn snapshot_reminders(&self) -> Vec<RemindRegistration> {
        self.reminders.read().await.values().cloned().collect()
    }

    /// Re-arm reminder tasks loaded from a snapshot. The original countdown
    /// isn't preserved across a restart; each restored registration starts
    /// its soft/hard window fresh from `now`.
    pub async fn restore_reminders(self: &Arc<Self>, regs: Vec<RemindRegistration>, now: Timestamp) {
        for reg in regs {
            if reg.active {
                self.register_periodic_remind(&reg.child, Duration::from_secs(reg.soft_period_seconds), Duration::from_secs(reg.hard_period_seconds), now).await;
            }
        }
    }

    /// EM lookup for `task-complete` (spec §4.5): parent-wake table first,
    /// falling back to `Session.parent`. Must be resolved before
    /// `cancel_parent_wake` removes the row.
    pub async fn resolve_em(&self, child: &str) -> Option<String> {
        if let Some(row) = self.parent_wakes.read().await.get(child) {
            if row.is_active {
                return Some(row.parent.clone());
            }
        }
        self.registry.get(child).await.and_then(|s| s.parent)
    }
}

enum WaitOutcome {
    Elapsed,
    Cancelled,
}

impl WaitOutcome {
    fn is_cancelled(&self) -> bool {
        matches!(self, WaitOutcome::Cancelled)
    }
}

#[cfg(test)]
#[path = "reminders_tests.rs"]
mod tests;
