// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC surface (spec §6): the localhost HTTP API external clients and the
//! hook script use to drive the coordinator. Handlers take `State<Arc<Coordinator>>`;
//! there is no ambient singleton (spec §9).

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::CoordError;
use crate::forum::best_effort_close;
use crate::hooks::{dispatch_hook, HookPayload};
use crate::queue::{DeliveryMode, QueueRequest};
use crate::review::{PrReviewClient, ReviewMode, ReviewOptions};
use crate::session::chrono_stub::Timestamp;
use crate::session::{ProviderTag, Session};
use crate::state::Coordinator;

/// Wraps the coordinator together with the one collaborator it doesn't own
/// itself: the PR-review client is a separate external surface (spec §4.9's
/// `pr` path talks to a GitHub API, not the forum notifier), so it's supplied
/// to the router rather than folded into [`Coordinator`].
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub pr_review_client: Arc<dyn PrReviewClient>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/{id}", get(get_session).patch(patch_session).delete(delete_session))
        .route("/sessions/{id}/input", post(queue_input))
        .route("/sessions/{id}/watch", post(watch_session))
        .route("/sessions/{id}/clear", post(clear_session))
        .route("/sessions/{id}/invalidate-cache", post(invalidate_cache))
        .route("/sessions/{id}/task-complete", post(task_complete))
        .route("/sessions/{id}/handoff", post(handoff_session))
        .route("/sessions/{id}/status", post(set_status))
        .route("/sessions/{id}/review", post(start_review))
        .route("/reviews/pr", post(start_pr_review))
        .route("/hooks/agent", post(hook_agent))
        .with_state(state)
}

impl IntoResponse for CoordError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "error": self.kind.as_str(), "message": self.message }))).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    working_dir: String,
    friendly_name: Option<String>,
    parent: Option<String>,
    #[serde(default)]
    provider: Option<ProviderTag>,
    chat_id: Option<String>,
}

/// `POST /sessions` (spec §6, forum policy spec §4.8): always assigns a
/// chat-id (caller-provided or the configured default), reuses a parent's
/// EM thread if one is already known, otherwise creates a fresh thread.
async fn create_session(State(s): State<AppState>, Json(req): Json<CreateSessionRequest>) -> Result<Json<Session>, CoordError> {
    let now = Timestamp::now();
    let chat_id = req.chat_id.or_else(|| s.coordinator.default_forum_chat.clone());
    let provider = req.provider.unwrap_or(ProviderTag::Claude);

    let session = s
        .coordinator
        .registry
        .create(req.working_dir, provider, req.parent, req.friendly_name, chat_id.clone(), now)
        .await?;

    if let Some(chat) = chat_id {
        let existing_thread = s.coordinator.registry.em_topic.read().await.thread.clone();
        let thread_id = match existing_thread {
            Some(thread) => Some(thread),
            None => s.coordinator.forum.create_thread(&chat, &format!("agent {}", session.id)).await.ok(),
        };
        if let Some(thread) = thread_id {
            s.coordinator.registry.set_thread_id(&session.id, thread).await?;
        }
    }

    s.coordinator.persist_now().await;
    let session = s.coordinator.registry.get(&session.id).await.ok_or_else(|| {
        CoordError::new(crate::error::ErrorKind::Internal, "session vanished immediately after creation")
    })?;
    Ok(Json(session))
}

async fn list_sessions(State(s): State<AppState>) -> Json<Vec<Session>> {
    Json(s.coordinator.registry.list().await)
}

async fn get_session(State(s): State<AppState>, Path(id): Path<String>) -> Result<Json<Session>, CoordError> {
    s.coordinator
        .registry
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| CoordError::new(crate::error::ErrorKind::UnknownSession, id))
}

#[derive(Debug, Deserialize)]
struct PatchSessionRequest {
    friendly_name: Option<String>,
    is_em: Option<bool>,
}

async fn patch_session(State(s): State<AppState>, Path(id): Path<String>, Json(req): Json<PatchSessionRequest>) -> Result<Json<Session>, CoordError> {
    if let Some(name) = req.friendly_name {
        s.coordinator.registry.set_friendly_name(&id, name).await?;
    }
    if let Some(is_em) = req.is_em {
        s.coordinator.registry.set_role_flag(&id, is_em).await?;
    }
    s.coordinator.persist_now().await;
    s.coordinator.registry.get(&id).await.map(Json).ok_or_else(|| CoordError::new(crate::error::ErrorKind::UnknownSession, id))
}

#[derive(Debug, Deserialize, Default)]
struct DeleteSessionRequest {
    caller: Option<String>,
}

/// `DELETE /sessions/{id}` (spec §4.1): cancel pending messages, reminders,
/// parent-wake, close the forum thread, then remove the pane + in-memory
/// record. Parent-scoped auth fails closed.
async fn delete_session(State(s): State<AppState>, Path(id): Path<String>, body: Option<Json<DeleteSessionRequest>>) -> Result<Json<Session>, CoordError> {
    let caller = body.and_then(|Json(b)| b.caller);
    s.coordinator.registry.authorize_destructive(caller.as_deref(), &id).await?;

    s.coordinator.queue.cancel_remind(&id).await;
    s.coordinator.queue.cancel_parent_wake(&id).await;
    {
        let state = s.coordinator.queue.state_for(&id).await;
        state.write().await.pending.clear();
    }

    let session = s.coordinator.registry.remove(&id).await?;
    if let (Some(chat), Some(thread)) = (session.chat_id.clone(), session.thread_id.clone()) {
        best_effort_close(s.coordinator.forum.as_ref(), &chat, &thread).await;
    }
    s.coordinator.persist_now().await;
    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
struct InputRequest {
    text: String,
    sender: Option<String>,
    mode: DeliveryMode,
    #[serde(default)]
    notify_on_stop: bool,
    #[serde(default)]
    notify_on_delivery: bool,
    notify_after_seconds: Option<u64>,
    timeout_seconds: Option<u64>,
}

async fn queue_input(State(s): State<AppState>, Path(id): Path<String>, Json(req): Json<InputRequest>) -> Result<Json<crate::queue::QueueOutcome>, CoordError> {
    let sender_name = match &req.sender {
        Some(sender_id) => s.coordinator.registry.get(sender_id).await.and_then(|s| s.friendly_name).unwrap_or_else(|| sender_id.clone()),
        None => "coordinator".to_owned(),
    };
    let outcome = s
        .coordinator
        .queue
        .queue_message(
            QueueRequest {
                target: id,
                sender: req.sender,
                sender_name,
                text: req.text,
                mode: req.mode,
                notify_on_stop: req.notify_on_stop,
                notify_on_delivery: req.notify_on_delivery,
                timeout_seconds: req.timeout_seconds,
                post_delivery_delay: req.notify_after_seconds.map(Duration::from_secs),
            },
            Timestamp::now(),
        )
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct WatchRequest {
    watcher: String,
    timeout_seconds: u64,
}

async fn watch_session(State(s): State<AppState>, Path(id): Path<String>, Json(req): Json<WatchRequest>) -> impl IntoResponse {
    s.coordinator.queue.watch_session(&id, &req.watcher, Duration::from_secs(req.timeout_seconds)).await;
    Json(serde_json::json!({ "status": "watching" }))
}

/// `POST /sessions/{id}/clear` (spec §6): arms the skip fence and clears
/// every piece of delivery-state the coordinator otherwise carries forward
/// across a context clear.
async fn clear_session(State(s): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, CoordError> {
    if s.coordinator.registry.get(&id).await.is_none() {
        return Err(CoordError::new(crate::error::ErrorKind::UnknownSession, id));
    }
    let slots = s.coordinator.queue.cache_invalidate(&id, Timestamp::now()).await;
    s.coordinator.hooks.clear_output(&id).await;
    Ok(Json(serde_json::json!({ "status": "cleared", "slots_armed": slots })))
}

async fn invalidate_cache(State(s): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, CoordError> {
    if s.coordinator.registry.get(&id).await.is_none() {
        return Err(CoordError::new(crate::error::ErrorKind::UnknownSession, id));
    }
    let slots = s.coordinator.queue.cache_invalidate(&id, Timestamp::now()).await;
    Ok(Json(serde_json::json!({ "status": "invalidated", "slots_armed": slots })))
}

/// `POST /sessions/{id}/task-complete` (spec §4.5): self-auth, resolve the EM
/// before cancelling parent-wake (the lookup row must still exist), then
/// cancel both timers and send one IMPORTANT notice.
async fn task_complete(State(s): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, CoordError> {
    if s.coordinator.registry.get(&id).await.is_none() {
        return Err(CoordError::new(crate::error::ErrorKind::UnknownSession, id));
    }
    let em = s.coordinator.queue.resolve_em(&id).await;
    s.coordinator.queue.cancel_remind(&id).await;
    s.coordinator.queue.cancel_parent_wake(&id).await;

    if let Some(em_id) = em {
        let sender_name = s.coordinator.registry.get(&id).await.and_then(|sess| sess.friendly_name).unwrap_or_else(|| id.clone());
        let _ = s
            .coordinator
            .queue
            .queue_message(
                QueueRequest {
                    target: em_id,
                    sender: Some(id.clone()),
                    sender_name,
                    text: format!("[task-complete] {id}"),
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
    Ok(Json(serde_json::json!({ "status": "completed" })))
}

#[derive(Debug, Deserialize)]
struct ReviewRequest {
    mode: ReviewMode,
    base: Option<String>,
    commit: Option<String>,
    custom: Option<String>,
    steer: Option<String>,
    #[serde(default)]
    branch_list_position: usize,
}

/// `POST /sessions/{id}/review` (spec §4.9): `start_review` itself marks the
/// session active before returning, so no watcher is registered here ahead
/// of that call.
async fn start_review(State(s): State<AppState>, Path(id): Path<String>, Json(req): Json<ReviewRequest>) -> Result<impl IntoResponse, CoordError> {
    s.coordinator
        .review
        .start_review(
            &id,
            req.mode,
            ReviewOptions {
                base: req.base,
                commit: req.commit,
                custom: req.custom,
                steer: req.steer,
                branch_list_position: req.branch_list_position,
            },
        )
        .await?;
    Ok(Json(serde_json::json!({ "status": "started" })))
}

#[derive(Debug, Deserialize)]
struct PrReviewRequest {
    pr_number: u64,
    repo: Option<String>,
    steer: Option<String>,
    wait: Option<u64>,
}

#[derive(Debug, Serialize)]
struct PrReviewResponse {
    comment_id: String,
    posted_at: String,
}

async fn start_pr_review(State(s): State<AppState>, Json(req): Json<PrReviewRequest>) -> Result<Json<PrReviewResponse>, CoordError> {
    let now = Timestamp::now();
    let (comment_id, _reviewed) = s
        .coordinator
        .review
        .start_pr_review(s.pr_review_client.as_ref(), req.pr_number, req.repo.as_deref(), req.steer.as_deref(), req.wait.map(Duration::from_secs))
        .await?;
    Ok(Json(PrReviewResponse { comment_id, posted_at: now.to_iso8601_utc() }))
}

/// `POST /hooks/agent` (spec §4.3): fire-and-forget from the agent runtime's
/// point of view, so this always returns 200 regardless of what the handler
/// logged internally.
async fn hook_agent(State(s): State<AppState>, Json(payload): Json<HookPayload>) -> impl IntoResponse {
    let decision = dispatch_hook(&s.coordinator, payload, Timestamp::now()).await;
    (StatusCode::OK, Json(decision))
}

#[derive(Debug, Deserialize)]
struct HandoffRequest {
    path: String,
}

/// `POST /sessions/{id}/handoff` (spec glossary "handoff"): records a
/// file-path token that's read and injected as the session's next prompt
/// on its next stop hook, ahead of skip-fence absorption (spec §5 ordering
/// guarantee 3).
async fn handoff_session(State(s): State<AppState>, Path(id): Path<String>, Json(req): Json<HandoffRequest>) -> Result<impl IntoResponse, CoordError> {
    if s.coordinator.registry.get(&id).await.is_none() {
        return Err(CoordError::new(crate::error::ErrorKind::UnknownSession, id));
    }
    s.coordinator.queue.state_for(&id).await.write().await.pending_handoff_path = Some(req.path);
    Ok(Json(serde_json::json!({ "status": "handoff-pending" })))
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    text: String,
}

/// `POST /sessions/{id}/status` (spec §4.5): records the status text and
/// resets the reminder timer, same as the "sm status" call the agent runs.
async fn set_status(State(s): State<AppState>, Path(id): Path<String>, Json(req): Json<StatusRequest>) -> Result<impl IntoResponse, CoordError> {
    let now = Timestamp::now();
    s.coordinator.registry.set_status_text(&id, req.text, now).await?;
    s.coordinator.queue.reset_remind_timer(&id, now).await;
    Ok(Json(serde_json::json!({ "status": "recorded" })))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
