// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Forum Notifier Interface (spec §4.8): abstract contract for an external
//! chat/thread system. Notifier failures are logged and swallowed — they
//! must never block the operation that triggered them (spec §7).

use std::sync::Mutex;

use reqwest::Client;
use serde_json::json;
use tracing::warn;

use crate::error::{CoordError, CoordResult, ErrorKind};

#[async_trait::async_trait]
pub trait ForumNotifier: Send + Sync {
    async fn create_thread(&self, chat: &str, title: &str) -> CoordResult<String>;
    async fn close_thread(&self, chat: &str, thread: &str) -> CoordResult<()>;
    async fn delete_thread(&self, chat: &str, thread: &str) -> CoordResult<()>;
    async fn send(&self, chat: &str, thread: Option<&str>, text: &str, reply_to: Option<&str>) -> CoordResult<()>;
}

/// Calls `notifier`, logging and swallowing any error (spec §7
/// forum-transient: "log and continue, never abort the invoking operation").
pub async fn best_effort_send(notifier: &dyn ForumNotifier, chat: &str, thread: Option<&str>, text: &str) {
    if let Err(e) = notifier.send(chat, thread, text, None).await {
        warn!(chat, thread, error = %e, "forum send failed, continuing");
    }
}

pub async fn best_effort_close(notifier: &dyn ForumNotifier, chat: &str, thread: &str) {
    if let Err(e) = notifier.close_thread(chat, thread).await {
        warn!(chat, thread, error = %e, "forum thread close failed, continuing");
    }
}

pub async fn best_effort_delete(notifier: &dyn ForumNotifier, chat: &str, thread: &str) {
    if let Err(e) = notifier.delete_thread(chat, thread).await {
        warn!(chat, thread, error = %e, "forum thread delete failed, continuing");
    }
}

/// In-memory recording notifier used by tests and as a safe default when no
/// real chat backend is configured.
#[derive(Default)]
pub struct RecordingForumNotifier {
    next_id: Mutex<u64>,
    pub created: Mutex<Vec<(String, String)>>,
    pub closed: Mutex<Vec<(String, String)>>,
    pub deleted: Mutex<Vec<(String, String)>>,
    pub sent: Mutex<Vec<(String, Option<String>, String)>>,
}

#[async_trait::async_trait]
impl ForumNotifier for RecordingForumNotifier {
    async fn create_thread(&self, chat: &str, title: &str) -> CoordResult<String> {
        let mut id = self.next_id.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *id += 1;
        let thread_id = format!("thread-{id}");
        self.created.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push((chat.to_owned(), title.to_owned()));
        Ok(thread_id)
    }

    async fn close_thread(&self, chat: &str, thread: &str) -> CoordResult<()> {
        self.closed.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push((chat.to_owned(), thread.to_owned()));
        Ok(())
    }

    async fn delete_thread(&self, chat: &str, thread: &str) -> CoordResult<()> {
        self.deleted.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push((chat.to_owned(), thread.to_owned()));
        Ok(())
    }

    async fn send(&self, chat: &str, thread: Option<&str>, text: &str, _reply_to: Option<&str>) -> CoordResult<()> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((chat.to_owned(), thread.map(str::to_owned), text.to_owned()));
        Ok(())
    }
}

/// HTTP-backed notifier for a forum/chat API reachable over plain REST
/// (spec §4.8 names the contract, not a wire format; this targets a simple
/// thread-per-session JSON API).
pub struct HttpForumNotifier {
    base_url: String,
    auth_token: Option<String>,
    client: Client,
}

impl HttpForumNotifier {
    pub fn new(base_url: String, auth_token: Option<String>) -> Self {
        let client = Client::builder().timeout(std::time::Duration::from_secs(10)).build().unwrap_or_default();
        Self { base_url, auth_token, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> CoordResult<serde_json::Value> {
        let req = self.client.post(self.url(path)).json(&body);
        let resp = self
            .apply_auth(req)
            .send()
            .await
            .map_err(|e| CoordError::new(ErrorKind::ForumTransient, e.to_string()))?
            .error_for_status()
            .map_err(|e| CoordError::new(ErrorKind::ForumTransient, e.to_string()))?;
        let bytes = resp.bytes().await.map_err(|e| CoordError::new(ErrorKind::ForumTransient, e.to_string()))?;
        if bytes.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| CoordError::new(ErrorKind::ForumTransient, e.to_string()))
    }
}

#[async_trait::async_trait]
impl ForumNotifier for HttpForumNotifier {
    async fn create_thread(&self, chat: &str, title: &str) -> CoordResult<String> {
        let value = self.post_json("/threads", json!({ "chat": chat, "title": title })).await?;
        value
            .get("thread_id")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .ok_or_else(|| CoordError::new(ErrorKind::ForumTransient, "missing thread_id in response"))
    }

    async fn close_thread(&self, chat: &str, thread: &str) -> CoordResult<()> {
        self.post_json("/threads/close", json!({ "chat": chat, "thread": thread })).await?;
        Ok(())
    }

    async fn delete_thread(&self, chat: &str, thread: &str) -> CoordResult<()> {
        self.post_json("/threads/delete", json!({ "chat": chat, "thread": thread })).await?;
        Ok(())
    }

    async fn send(&self, chat: &str, thread: Option<&str>, text: &str, reply_to: Option<&str>) -> CoordResult<()> {
        self.post_json("/messages", json!({ "chat": chat, "thread": thread, "text": text, "reply_to": reply_to })).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "forum_tests.rs"]
mod tests;
