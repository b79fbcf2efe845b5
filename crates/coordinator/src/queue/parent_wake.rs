// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parent-wake digests (spec §4.5): periodic status digest delivered to a
//! parent about a child's recent activity. All relative ages are computed
//! in UTC (spec P6/S4) since the audit table stores UTC-naive timestamps.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::session::chrono_stub::Timestamp;

use super::{DeliveryMode, MessageQueue, QueueRequest};

const TOOL_EVENTS_IN_DIGEST: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentWakeRegistration {
    pub id: Uuid,
    pub child: String,
    pub parent: String,
    pub period_seconds: u64,
    pub registered_at: Timestamp,
    pub last_wake_at: Option<Timestamp>,
    pub last_status_text_at_prev_wake: Option<Timestamp>,
    pub escalated: bool,
    pub is_active: bool,
}

impl MessageQueue {
    pub async fn register_parent_wake(self: &Arc<Self>, child: &str, parent: &str, period: Duration, now: Timestamp) {
        self.cancel_parent_wake(child).await;

        let registration = ParentWakeRegistration {
            id: Uuid::new_v4(),
            child: child.to_owned(),
            parent: parent.to_owned(),
            period_seconds: period.as_secs(),
            registered_at: now,
            last_wake_at: None,
            last_status_text_at_prev_wake: None,
            escalated: false,
            is_active: true,
        };
        self.parent_wakes.write().await.insert(child.to_owned(), registration);

        let cancel = CancellationToken::new();
        {
            let mut tasks = self.tasks.write().await;
            tasks.entry(child.to_owned()).or_default().parent_wake = Some(cancel.clone());
        }

        let queue = self.clone();
        let child = child.to_owned();
        tokio::spawn(async move {
            queue.run_parent_wake_task(child, period, cancel).await;
        });
    }

    async fn run_parent_wake_task(self: Arc<Self>, child: String, period: Duration, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                _ = cancel.cancelled() => return,
            }
            let active = self.parent_wakes.read().await.get(&child).map(|r| r.is_active).unwrap_or(false);
            if !active {
                return;
            }
            self.fire_parent_wake(&child).await;
        }
    }

    async fn fire_parent_wake(self: &Arc<Self>, child: &str) {
        let Some(registration) = self.parent_wakes.read().await.get(child).cloned() else { return };
        let Some(session) = self.registry.get(child).await else { return };
        let now = Timestamp::now();

        let status_line = match &session.status_text {
            Some(st) => format!("{} ({})", st.text, st.at.relative_age_minutes(now)),
            None => "(no status reported)".to_owned(),
        };

        let events = self.audit.last_n_for_session(child, TOOL_EVENTS_IN_DIGEST).await;
        let mut lines = vec![format!("[parent-wake] {child}: {status_line}")];
        for event in events {
            lines.push(format!("  {} {} ({})", event.tool_name, event.target_file.unwrap_or_default(), event.timestamp_utc.relative_age_minutes(now)));
        }
        let digest = lines.join("\n");

        let _ = self
            .queue_message(
                QueueRequest {
                    target: registration.parent.clone(),
                    sender: None,
                    sender_name: "coordinator".to_owned(),
                    text: digest,
                    mode: DeliveryMode::Sequential,
                    notify_on_stop: false,
                    notify_on_delivery: false,
                    timeout_seconds: None,
                    post_delivery_delay: None,
                },
                now,
            )
            .await;

        if let Some(row) = self.parent_wakes.write().await.get_mut(child) {
            row.last_wake_at = Some(now);
            row.last_status_text_at_prev_wake = session.status_text.map(|st| st.at);
        }
        info!(child, parent = registration.parent.as_str(), "parent-wake digest delivered");
    }

    /// Current registrations for snapshot persistence (spec §6 layout).
    pub async fn snapshot_parent_wakes(&self) -> Vec<ParentWakeRegistration> {
        self.parent_wakes.read().await.values().cloned().collect()
    }

    /// Re-arm parent-wake tasks loaded from a snapshot, starting the period
    /// fresh from `now` (the prior countdown isn't preserved).
    pub async fn restore_parent_wakes(self: &Arc<Self>, regs: Vec<ParentWakeRegistration>, now: Timestamp) {
        for reg in regs {
            if reg.is_active {
                self.register_parent_wake(&reg.child, &reg.parent, Duration::from_secs(reg.period_seconds), now).await;
            }
        }
    }

    pub async fn cancel_parent_wake(&self, child: &str) {
        if let Some(reg) = self.parent_wakes.write().await.get_mut(child) {
            reg.is_active = false;
        }
        if let Some(tasks) = self.tasks.write().await.get_mut(child) {
            if let Some(cancel) = tasks.parent_wake.take() {
                cancel.cancel();
            }
        }
    }
}

#[cfg(test)]
#[path = "parent_wake_tests.rs"]
mod tests;
