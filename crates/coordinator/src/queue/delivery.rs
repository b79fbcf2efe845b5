// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delivery engine: queueing, batching, the pending-user-input guard, and
//! the URGENT/STEER immediate-injection paths.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{CoordError, CoordResult, ErrorKind};
use crate::session::chrono_stub::Timestamp;
use termio::Keystroke;

use super::{short_id, DeliveryMode, MessageQueue, QueuedMessage, SessionDeliveryState};

pub struct QueueRequest {
    pub target: String,
    pub sender: Option<String>,
    pub sender_name: String,
    pub text: String,
    pub mode: DeliveryMode,
    pub notify_on_stop: bool,
    pub notify_on_delivery: bool,
    pub timeout_seconds: Option<u64>,
    pub post_delivery_delay: Option<Duration>,
}

/// Outcome returned to the RPC layer for `POST /sessions/{id}/input`.
#[derive(Debug, serde::Serialize)]
pub struct QueueOutcome {
    pub status: &'static str,
    pub mode: DeliveryMode,
}

impl MessageQueue {
    /// `queue_message` (spec §4.4): appends to the target's FIFO, applies
    /// fail-closed EM gating on `notify-on-stop` (P5), and schedules a
    /// delivery attempt.
    pub async fn queue_message(self: &Arc<Self>, req: QueueRequest, now: Timestamp) -> CoordResult<QueueOutcome> {
        if self.registry.get(&req.target).await.is_none() {
            return Err(CoordError::new(ErrorKind::UnknownSession, req.target.clone()));
        }

        let notify_on_stop = if req.notify_on_stop {
            match &req.sender {
                Some(sender_id) => match self.registry.get(sender_id).await {
                    Some(sender) => sender.is_em,
                    None => false,
                },
                None => false,
            }
        } else {
            false
        };

        let message = QueuedMessage {
            id: Uuid::new_v4(),
            target: req.target.clone(),
            sender: req.sender,
            sender_name: req.sender_name,
            text: req.text,
            mode: req.mode,
            queued_at: now,
            timeout_deadline: req.timeout_seconds.map(|s| Timestamp::from_epoch_ms(now.epoch_ms() + s * 1000)),
            notify_on_stop,
            notify_on_delivery: req.notify_on_delivery,
            post_delivery_delay: req.post_delivery_delay,
            delivered_at: None,
        };

        let state_arc = self.state_for(&req.target).await;
        {
            let mut state = state_arc.write().await;
            state.pending.push_back(message);
        }

        let mode = req.mode;
        if mode == DeliveryMode::Urgent || mode == DeliveryMode::Steer {
            self.deliver_immediate(&req.target, mode).await;
        } else {
            self.schedule_try_deliver(&req.target).await;
        }

        Ok(QueueOutcome { status: "queued", mode })
    }

    /// Attempt delivery now. Named to match the spec's "schedules
    /// try_deliver(id)" wording; `try_deliver` is itself idempotent so
    /// calling it inline from hook/RPC handlers (rather than spawning a
    /// detached task) is sufficient to satisfy that contract.
    pub(crate) async fn schedule_try_deliver(self: &Arc<Self>, session_id: &str) {
        if let Err(e) = self.try_deliver(session_id).await {
            warn!(session = session_id, error = %e, "scheduled delivery attempt failed");
        }
    }

    fn batch_payload(messages: &[QueuedMessage]) -> String {
        messages
            .iter()
            .map(|m| format!("[From {} ({})] {}", m.sender_name, short_id(m.sender.as_deref().unwrap_or("coordinator")), m.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Idempotent delivery entry point (P2). Delivers when the target is
    /// idle (SEQUENTIAL/IMPORTANT gating) — URGENT/STEER use
    /// [`Self::deliver_immediate`] instead and never pass through here.
    pub async fn try_deliver(self: &Arc<Self>, session_id: &str) -> CoordResult<()> {
        let state_arc = self.state_for(session_id).await;

        {
            let mut state = state_arc.write().await;
            if state.delivery_in_flight {
                return Ok(());
            }
            if !state.is_idle || state.pending.is_empty() {
                return Ok(());
            }
            state.delivery_in_flight = true;
        }

        let fut: Pin<Box<dyn Future<Output = CoordResult<()>> + Send + '_>> =
            Box::pin(self.run_delivery(session_id, &state_arc, false, Timestamp::now()));
        let result = fut.await;
        state_arc.write().await.delivery_in_flight = false;
        result
    }

    /// URGENT/STEER path: interrupt (or Enter/text/Enter for STEER) then
    /// inject immediately, bypassing the pending-user-input guard.
    async fn deliver_immediate(self: &Arc<Self>, session_id: &str, mode: DeliveryMode) {
        let state_arc = self.state_for(session_id).await;
        {
            let mut state = state_arc.write().await;
            if state.delivery_in_flight {
                return;
            }
            state.delivery_in_flight = true;
        }

        let pane_name = match self.registry.get(session_id).await {
            Some(s) => s.pane_name,
            None => {
                state_arc.write().await.delivery_in_flight = false;
                return;
            }
        };

        let provider_caps = self.registry.get(session_id).await.map(|s| s.provider.caps());
        let mut preamble = Vec::new();
        if mode == DeliveryMode::Urgent {
            preamble.push(Keystroke::ctrl_c().with_delay(Duration::from_millis(500)));
        } else if mode == DeliveryMode::Steer && provider_caps.map(|c| c.supports_steer).unwrap_or(false) {
            preamble.push(Keystroke::enter());
        }

        if let Err(e) = self.adapter.send_keys(&pane_name, &preamble).await {
            warn!(session = session_id, error = %e, "urgent preamble send failed");
        }

        let fut: Pin<Box<dyn Future<Output = CoordResult<()>> + Send + '_>> =
            Box::pin(self.run_delivery(session_id, &state_arc, true, Timestamp::now()));
        let _ = fut.await;
        state_arc.write().await.delivery_in_flight = false;
    }

    async fn run_delivery(
        self: &Arc<Self>,
        session_id: &str,
        state_arc: &Arc<RwLock<SessionDeliveryState>>,
        skip_save_restore: bool,
        now: Timestamp,
    ) -> CoordResult<()> {
        let Some(session) = self.registry.get(session_id).await else {
            let mut state = state_arc.write().await;
            warn!(session = session_id, "target vanished, dropping pending messages");
            state.pending.clear();
            return Err(CoordError::new(ErrorKind::UnknownSession, session_id));
        };

        if !skip_save_restore {
            if let Err(e) = self.await_pending_user_input_clear(state_arc, &session.pane_name).await {
                warn!(session = session_id, error = %e, "pane capture failed during delivery guard, proceeding");
            }
        }

        let mut batch: Vec<QueuedMessage> = {
            let mut state = state_arc.write().await;
            state.pending.drain(..).collect()
        };
        if batch.is_empty() {
            return Ok(());
        }

        if !skip_save_restore {
            // The guard above can race a keystroke that lands in the window between
            // its last clean poll and this send; one bounded re-check catches it
            // without looping forever.
            let reappeared = self
                .adapter
                .capture(&session.pane_name, 1)
                .await
                .ok()
                .and_then(|lines| lines.last().cloned())
                .map(|last| !last.trim().is_empty())
                .unwrap_or(false);
            if reappeared {
                if let Err(e) = self.await_pending_user_input_clear(state_arc, &session.pane_name).await {
                    warn!(session = session_id, error = %e, "pane capture failed during delivery guard recheck, proceeding");
                }
            }
        }

        let payload = Self::batch_payload(&batch);
        let keys = vec![Keystroke::text(payload), Keystroke::enter()];

        self.adapter
            .send_keys(&session.pane_name, &keys)
            .await
            .map_err(|e| CoordError::new(ErrorKind::PaneGone, e.to_string()))?;

        tokio::time::sleep(Duration::from_millis(300)).await;

        for message in &mut batch {
            message.delivered_at = Some(now);
        }

        let mut state = state_arc.write().await;
        let fence_armed = state.stop_notify_skip_count > 0;
        for message in &batch {
            if message.notify_on_stop {
                if fence_armed {
                    state.paste_buffered_notify_sender_id = message.sender.clone();
                } else {
                    state.stop_notify_sender_id = message.sender.clone();
                }
            }
        }
        drop(state);

        for message in &batch {
            if message.notify_on_delivery {
                if let Some(sender_id) = message.sender.clone() {
                    let this = self.clone();
                    let delay = message.post_delivery_delay;
                    tokio::spawn(async move {
                        if let Some(delay) = delay {
                            tokio::time::sleep(delay).await;
                        }
                        this.send_delivery_notification(&sender_id).await;
                    });
                }
            }
        }

        info!(session = session_id, count = batch.len(), "batch delivered");
        Ok(())
    }

    /// Back-notification for `notify-on-delivery` (spec §4.4), mirroring the
    /// `notify-on-stop` "[agent stopped]" path but fired once the batch lands
    /// rather than on the target's next idle transition.
    async fn send_delivery_notification(self: &Arc<Self>, sender_id: &str) {
        if self.registry.get(sender_id).await.is_none() {
            warn!(sender = sender_id, "delivery-notify sender vanished, dropping notification");
            return;
        }
        let now = Timestamp::now();
        let _ = self
            .queue_message(
                QueueRequest {
                    target: sender_id.to_owned(),
                    sender: None,
                    sender_name: "coordinator".to_owned(),
                    text: "[delivered]".to_owned(),
                    mode: DeliveryMode::Sequential,
                    notify_on_stop: false,
                    notify_on_delivery: false,
                    timeout_seconds: None,
                    post_delivery_delay: None,
                },
                now,
            )
            .await;
    }

    /// Poll the pane's last line for a non-empty user draft; clear it into
    /// `saved_user_input` after `input_stale_timeout` of no change (spec
    /// §4.4). Restores a draft saved by a previous delivery before looking
    /// at anything else. Best-effort: a capture error ends the guard without
    /// blocking delivery. No overall deadline — `input_stale_timeout` bounds
    /// only how long the *same* draft may sit unchanged.
    async fn await_pending_user_input_clear(&self, state_arc: &Arc<RwLock<SessionDeliveryState>>, pane_name: &str) -> CoordResult<()> {
        let saved = state_arc.write().await.saved_user_input.take();
        if let Some(text) = saved {
            if let Err(e) = self.adapter.send_keys(pane_name, &[Keystroke::text(text)]).await {
                warn!(pane = pane_name, error = %e, "failed to restore saved user input");
            }
        }

        let mut tracked: Option<(String, Instant)> = None;
        loop {
            let lines = self
                .adapter
                .capture(pane_name, 1)
                .await
                .map_err(|e| CoordError::new(ErrorKind::PaneGone, e.to_string()))?;
            let last = lines.last().cloned().unwrap_or_default();
            if last.trim().is_empty() {
                return Ok(());
            }

            let stale = match &tracked {
                Some((text, since)) if *text == last => since.elapsed() >= self.input_stale_timeout,
                _ => {
                    tracked = Some((last.clone(), Instant::now()));
                    false
                }
            };

            if stale {
                state_arc.write().await.saved_user_input = Some(last.clone());
                if let Some(clear) = Keystroke::named("ctrl-u") {
                    if let Err(e) = self.adapter.send_keys(pane_name, &[clear]).await {
                        warn!(pane = pane_name, error = %e, "failed to clear stale user input");
                    }
                }
                return Ok(());
            }

            tokio::time::sleep(self.input_poll_interval).await;
        }
    }
}

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
