// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watchers (spec §4.4): `watch_session(target, watcher, timeout)` polls
//! for an idle transition (or times out) and fires a message to `watcher`.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::session::{chrono_stub::Timestamp, ProviderTag, SessionStatus};

use super::{DeliveryMode, MessageQueue, QueueRequest};

const WATCH_POLL: Duration = Duration::from_secs(2);

impl MessageQueue {
    pub async fn watch_session(self: &Arc<Self>, target: &str, watcher: &str, timeout: Duration) {
        let cancel = CancellationToken::new();
        {
            let mut tasks = self.tasks.write().await;
            tasks.entry(target.to_owned()).or_default().watchers.push(cancel.clone());
        }

        let queue = self.clone();
        let target = target.to_owned();
        let watcher = watcher.to_owned();
        tokio::spawn(async move {
            queue.run_watcher(target, watcher, timeout, cancel).await;
        });
    }

    async fn run_watcher(self: Arc<Self>, target: String, watcher: String, timeout: Duration, cancel: CancellationToken) {
        let deadline = Instant::now() + timeout;
        let mut consecutive_prompt_hits = 0u32;

        loop {
            if Instant::now() >= deadline {
                self.notify_watcher(&watcher, &target, "timeout").await;
                return;
            }

            let Some(session) = self.registry.get(&target).await else {
                // No session at all: fall through to fire immediately.
                self.notify_watcher(&watcher, &target, "idle").await;
                return;
            };

            let is_idle = self.is_idle(&target).await;
            let pane_prompt_hit = if !is_idle && session.provider == ProviderTag::CodexTmux {
                self.pane_shows_prompt(&session.pane_name).await
            } else {
                false
            };

            if !is_idle && session.provider == ProviderTag::CodexTmux {
                consecutive_prompt_hits = if pane_prompt_hit { consecutive_prompt_hits + 1 } else { 0 };
                if consecutive_prompt_hits >= 2 {
                    self.notify_watcher(&watcher, &target, "idle").await;
                    return;
                }
            } else if session.status == SessionStatus::Idle || is_idle {
                let pending = self.pending_count(&target).await > 0;
                if pending {
                    let hit = self.pane_shows_prompt(&session.pane_name).await;
                    consecutive_prompt_hits = if hit { consecutive_prompt_hits + 1 } else { 0 };
                    if consecutive_prompt_hits >= 2 {
                        self.notify_watcher(&watcher, &target, "idle").await;
                        return;
                    }
                } else if self.pane_shows_prompt(&session.pane_name).await {
                    self.notify_watcher(&watcher, &target, "idle").await;
                    return;
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let slice = remaining.min(WATCH_POLL);
            tokio::select! {
                _ = tokio::time::sleep(slice) => {}
                _ = cancel.cancelled() => {
                    debug!(target = target.as_str(), "watcher cancelled");
                    return;
                }
            }
        }
    }

    async fn pane_shows_prompt(&self, pane_name: &str) -> bool {
        match self.adapter.capture(pane_name, 5).await {
            Ok(lines) => lines.last().map(|l| l.trim_end().ends_with("> ")).unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn notify_watcher(self: &Arc<Self>, watcher: &str, target: &str, kind: &str) {
        let text = format!("[watch] {target} -> {kind}");
        let _ = self
            .queue_message(
                QueueRequest {
                    target: watcher.to_owned(),
                    sender: None,
                    sender_name: "coordinator".to_owned(),
                    text,
                    mode: DeliveryMode::Sequential,
                    notify_on_stop: false,
                    notify_on_delivery: false,
                    timeout_seconds: None,
                    post_delivery_delay: None,
                },
                Timestamp::now(),
            )
            .await;
    }
}

#[cfg(test)]
#[path = "watchers_tests.rs"]
mod tests;
