// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session Registry: the in-memory table of sessions keyed by 8-hex id.
//!
//! Authorization over destructive operations is parent-scoped and fails
//! closed. Each entry is guarded by its own lock (striped by session id)
//! rather than one table-wide lock, so a slow operation on one session
//! never blocks reads of another.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{CoordError, CoordResult, ErrorKind};
use crate::session::chrono_stub::Timestamp;
use crate::session::{Session, SessionStatus};
use termio::TerminalAdapter;

/// One id-generation retry budget before giving up (collisions are vanishingly
/// rare at 8 hex digits but the loop must terminate).
const ID_GEN_ATTEMPTS: u32 = 64;

fn random_id() -> String {
    let n: u32 = rand::thread_rng().gen();
    format!("{n:08x}")
}

/// Top-level fields the registry persists alongside the session table
/// (spec §4.8 EM-handoff support).
#[derive(Debug, Clone, Default)]
pub struct EmTopic {
    pub chat: Option<String>,
    pub thread: Option<String>,
}

/// Session Registry — striped-lock table of live sessions.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<RwLock<Session>>>>,
    adapter: Arc<dyn TerminalAdapter>,
    pub em_topic: RwLock<EmTopic>,
}

impl SessionRegistry {
    pub fn new(adapter: Arc<dyn TerminalAdapter>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            adapter,
            em_topic: RwLock::new(EmTopic::default()),
        }
    }

    /// Allocate a fresh 8-hex id with a collision check against the live table.
    async fn fresh_id(&self) -> CoordResult<String> {
        let sessions = self.sessions.read().await;
        for _ in 0..ID_GEN_ATTEMPTS {
            let candidate = random_id();
            if !sessions.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(CoordError::new(ErrorKind::Internal, "exhausted id generation attempts"))
    }

    /// Create a session: allocate id, materialize the pane, set the identity
    /// env var, and register the entry. The snapshot write is the caller's
    /// responsibility (state.rs sequences registry mutation + persistence).
    pub async fn create(
        &self,
        working_dir: String,
        provider: crate::session::ProviderTag,
        parent: Option<String>,
        friendly_name: Option<String>,
        chat_id: Option<String>,
        now: Timestamp,
    ) -> CoordResult<Session> {
        let id = self.fresh_id().await?;
        let pane_name = Session::pane_name_for(&id);

        self.adapter
            .create_pane(&pane_name, &working_dir, &[])
            .await
            .map_err(|e| CoordError::new(ErrorKind::PaneGone, e.to_string()))?;
        self.adapter
            .set_env(&pane_name, "COORD_SESSION_ID", &id)
            .await
            .map_err(|e| CoordError::new(ErrorKind::PaneGone, e.to_string()))?;

        let session = Session::new(id.clone(), working_dir, provider, parent, friendly_name, chat_id, now);
        self.sessions.write().await.insert(id, Arc::new(RwLock::new(session.clone())));
        Ok(session)
    }

    pub async fn get(&self, id: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        let entry = sessions.get(id)?;
        let session = entry.read().await.clone();
        Some(session)
    }

    pub async fn get_entry(&self, id: &str) -> Option<Arc<RwLock<Session>>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<Session> {
        let sessions = self.sessions.read().await;
        let mut out = Vec::with_capacity(sessions.len());
        for entry in sessions.values() {
            out.push(entry.read().await.clone());
        }
        out
    }

    pub async fn children_of(&self, parent: &str) -> Vec<Session> {
        self.list().await.into_iter().filter(|s| s.parent.as_deref() == Some(parent)).collect()
    }

    /// Parent-scoped authorization: caller `s` may target `t` iff `t.parent
    /// == Some(s)`, or `s` is `None` (operator, no caller context). Fails
    /// closed: a caller id that names no live session is forbidden.
    pub async fn authorize_destructive(&self, caller: Option<&str>, target: &str) -> CoordResult<()> {
        let Some(target_session) = self.get(target).await else {
            return Err(CoordError::new(ErrorKind::UnknownSession, target));
        };
        match caller {
            None => Ok(()),
            Some(caller_id) => {
                if self.get(caller_id).await.is_none() {
                    return Err(CoordError::new(ErrorKind::NotPermitted, "unknown caller"));
                }
                if target_session.parent.as_deref() == Some(caller_id) {
                    Ok(())
                } else {
                    Err(CoordError::new(ErrorKind::NotPermitted, "caller is not the target's parent"))
                }
            }
        }
    }

    pub async fn update_status(&self, id: &str, status: SessionStatus) -> CoordResult<()> {
        let entry = self.get_entry(id).await.ok_or_else(|| CoordError::new(ErrorKind::UnknownSession, id))?;
        entry.write().await.status = status;
        Ok(())
    }

    pub async fn set_friendly_name(&self, id: &str, name: String) -> CoordResult<()> {
        let entry = self.get_entry(id).await.ok_or_else(|| CoordError::new(ErrorKind::UnknownSession, id))?;
        entry.write().await.friendly_name = Some(name);
        Ok(())
    }

    /// `is_em = true` triggers EM-thread inheritance: the session adopts the
    /// registry's last-known EM chat/thread if it doesn't already have one.
    pub async fn set_role_flag(&self, id: &str, is_em: bool) -> CoordResult<()> {
        let entry = self.get_entry(id).await.ok_or_else(|| CoordError::new(ErrorKind::UnknownSession, id))?;
        let mut session = entry.write().await;
        session.is_em = is_em;
        if is_em {
            let topic = self.em_topic.read().await;
            if session.chat_id.is_none() {
                session.chat_id = topic.chat.clone();
            }
            if session.thread_id.is_none() {
                session.thread_id = topic.thread.clone();
            }
        }
        drop(session);
        if is_em {
            let session = entry.read().await;
            let mut topic = self.em_topic.write().await;
            topic.chat = session.chat_id.clone();
            topic.thread = session.thread_id.clone();
        }
        Ok(())
    }

    pub async fn backfill_chat_id(&self, id: &str, default_chat: &str) -> CoordResult<()> {
        let entry = self.get_entry(id).await.ok_or_else(|| CoordError::new(ErrorKind::UnknownSession, id))?;
        let mut session = entry.write().await;
        if session.chat_id.is_none() {
            session.chat_id = Some(default_chat.to_owned());
        }
        Ok(())
    }

    pub async fn set_thread_id(&self, id: &str, thread_id: String) -> CoordResult<()> {
        let entry = self.get_entry(id).await.ok_or_else(|| CoordError::new(ErrorKind::UnknownSession, id))?;
        entry.write().await.thread_id = Some(thread_id);
        Ok(())
    }

    /// Drop a dead session from the table without touching the pane or
    /// external resources (startup reconciliation path).
    pub async fn forget(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }

    /// Load sessions from a snapshot without touching panes; pane liveness
    /// is the Startup Reconciler's job (spec §4.10 step b).
    pub async fn restore_sessions(&self, sessions: Vec<Session>) {
        let mut table = self.sessions.write().await;
        for session in sessions {
            table.insert(session.id.clone(), Arc::new(RwLock::new(session)));
        }
    }

    pub async fn restore_em_topic(&self, topic: EmTopic) {
        *self.em_topic.write().await = topic;
    }

    pub async fn set_compacting(&self, id: &str, compacting: bool) -> CoordResult<()> {
        let entry = self.get_entry(id).await.ok_or_else(|| CoordError::new(ErrorKind::UnknownSession, id))?;
        entry.write().await.is_compacting = compacting;
        Ok(())
    }

    pub async fn set_status_text(&self, id: &str, text: String, at: Timestamp) -> CoordResult<()> {
        let entry = self.get_entry(id).await.ok_or_else(|| CoordError::new(ErrorKind::UnknownSession, id))?;
        entry.write().await.status_text = Some(crate::session::StatusText { text, at });
        Ok(())
    }

    pub async fn touch_last_tool_call(&self, id: &str, now: Timestamp) -> CoordResult<()> {
        let entry = self.get_entry(id).await.ok_or_else(|| CoordError::new(ErrorKind::UnknownSession, id))?;
        entry.write().await.last_tool_call_at = Some(now);
        Ok(())
    }

    pub async fn set_resume_token(&self, id: &str, token: String) -> CoordResult<()> {
        let entry = self.get_entry(id).await.ok_or_else(|| CoordError::new(ErrorKind::UnknownSession, id))?;
        entry.write().await.resume_token = Some(token);
        Ok(())
    }

    pub async fn set_completion_status(&self, id: &str, status: crate::session::CompletionStatus) -> CoordResult<()> {
        let entry = self.get_entry(id).await.ok_or_else(|| CoordError::new(ErrorKind::UnknownSession, id))?;
        entry.write().await.completion_status = Some(status);
        Ok(())
    }

    /// Remove the in-memory record and best-effort kill the pane. Reminders,
    /// parent-wake, pending messages, and the forum thread are the caller's
    /// responsibility (state.rs orchestrates the full delete sequence).
    pub async fn remove(&self, id: &str) -> CoordResult<Session> {
        let session = {
            let mut sessions = self.sessions.write().await;
            let entry = sessions.remove(id).ok_or_else(|| CoordError::new(ErrorKind::UnknownSession, id))?;
            let session = entry.read().await.clone();
            session
        };
        match self.adapter.kill_pane(&session.pane_name).await {
            Ok(()) => debug!(session = id, "pane killed"),
            Err(e) => warn!(session = id, error = %e, "pane already gone on delete"),
        }
        Ok(session)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
