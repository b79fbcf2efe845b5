// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash Recovery Engine (spec §4.6): classifies pane output for harness
//! crashes, defers recovery while a session is running, and restarts with a
//! resume token when it's safe to do so.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::registry::SessionRegistry;
use crate::session::{ProviderTag, SessionStatus};
use termio::{Keystroke, TerminalAdapter};

const SUCCESS_COOLDOWN: Duration = Duration::from_secs(30);
const FAILURE_COOLDOWN: Duration = Duration::from_secs(5);

/// Substrings that identify a harness crash dump in captured pane output.
/// Named for the behavior, not tied to one provider's exact wording (spec
/// §9 open question: exact patterns vary across versions).
const CRASH_SIGNATURES: &[&str] = &["panicked at", "segmentation fault", "stack overflow", "fatal error", "core dumped"];

#[derive(Debug, Clone, Copy)]
enum CooldownKind {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy)]
struct Cooldown {
    at: Instant,
    kind: CooldownKind,
}

pub fn classify_crash(lines: &[String]) -> bool {
    lines.iter().any(|line| {
        let lower = line.to_lowercase();
        CRASH_SIGNATURES.iter().any(|sig| lower.contains(sig))
    })
}

/// Detects harness crashes, debounces repeat detections, and defers
/// recovery until a session is safe to restart.
pub struct CrashRecoveryEngine {
    registry: Arc<SessionRegistry>,
    adapter: Arc<dyn TerminalAdapter>,
    cooldowns: RwLock<HashMap<String, Cooldown>>,
    pending_recovery: RwLock<HashSet<String>>,
    awaiting_permission: RwLock<HashSet<String>>,
}

impl CrashRecoveryEngine {
    pub fn new(registry: Arc<SessionRegistry>, adapter: Arc<dyn TerminalAdapter>) -> Self {
        Self {
            registry,
            adapter,
            cooldowns: RwLock::new(HashMap::new()),
            pending_recovery: RwLock::new(HashSet::new()),
            awaiting_permission: RwLock::new(HashSet::new()),
        }
    }

    pub async fn mark_awaiting_permission(&self, session_id: &str) {
        self.awaiting_permission.write().await.insert(session_id.to_owned());
    }

    pub async fn clear_awaiting_permission(&self, session_id: &str) {
        self.awaiting_permission.write().await.remove(session_id);
    }

    async fn in_cooldown(&self, session_id: &str) -> bool {
        let cooldowns = self.cooldowns.read().await;
        match cooldowns.get(session_id) {
            None => false,
            Some(c) => {
                let window = match c.kind {
                    CooldownKind::Success => SUCCESS_COOLDOWN,
                    CooldownKind::Failure => FAILURE_COOLDOWN,
                };
                c.at.elapsed() < window
            }
        }
    }

    async fn record(&self, session_id: &str, kind: CooldownKind) {
        self.cooldowns.write().await.insert(session_id.to_owned(), Cooldown { at: Instant::now(), kind });
    }

    /// Called by the Pane Output Monitor when captured output matches a
    /// crash signature (spec §4.2 classification step 1).
    pub async fn on_crash_detected(&self, session_id: &str) {
        let Some(session) = self.registry.get(session_id).await else { return };
        if session.provider != ProviderTag::Claude {
            return;
        }
        if self.in_cooldown(session_id).await {
            return;
        }

        if session.status == SessionStatus::Running {
            self.pending_recovery.write().await.insert(session_id.to_owned());
            info!(session = session_id, "crash detected while running, deferring recovery");
            return;
        }

        self.recover_session(session_id, true).await;
    }

    /// Called on a transition to IDLE/STOPPED from completion or
    /// idle-timeout (never from a permission prompt, spec §4.6).
    pub async fn flush_pending_recovery(&self, session_id: &str) {
        if self.awaiting_permission.read().await.contains(session_id) {
            return;
        }
        let was_pending = self.pending_recovery.write().await.remove(session_id);
        if was_pending {
            self.recover_session(session_id, true).await;
        }
    }

    pub async fn is_pending_recovery(&self, session_id: &str) -> bool {
        self.pending_recovery.read().await.contains(session_id)
    }

    /// `recover_session(session, graceful)` (spec §4.6): send `/exit` (or an
    /// interrupt) then `unset CLAUDECODE` then resume with the session's
    /// resume token.
    pub async fn recover_session(&self, session_id: &str, graceful: bool) {
        let Some(session) = self.registry.get(session_id).await else {
            warn!(session = session_id, "recovery target vanished");
            return;
        };

        let exit_keys = if graceful {
            vec![Keystroke::text("/exit"), Keystroke::enter()]
        } else {
            vec![Keystroke::ctrl_c()]
        };
        if let Err(e) = self.adapter.send_keys(&session.pane_name, &exit_keys).await {
            warn!(session = session_id, error = %e, "recovery exit sequence failed");
        }

        let unset_keys = vec![Keystroke::text("unset CLAUDECODE"), Keystroke::enter()];
        if let Err(e) = self.adapter.send_keys(&session.pane_name, &unset_keys).await {
            warn!(session = session_id, error = %e, "recovery env reset failed");
            self.record(session_id, CooldownKind::Failure).await;
            return;
        }

        let resume_cmd = match &session.resume_token {
            Some(token) => format!("claude --resume {token}"),
            None => "claude".to_owned(),
        };
        let resume_keys = vec![Keystroke::text(resume_cmd), Keystroke::enter()];
        match self.adapter.send_keys(&session.pane_name, &resume_keys).await {
            Ok(()) => {
                self.record(session_id, CooldownKind::Success).await;
                info!(session = session_id, graceful, "session recovered");
            }
            Err(e) => {
                warn!(session = session_id, error = %e, "recovery resume failed");
                self.record(session_id, CooldownKind::Failure).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "crash_recovery_tests.rs"]
mod tests;
