use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;

use crate::review::PrReviewClient;
use crate::session::{ProviderTag, Session};
use crate::test_support::{test_coordinator, RecordingAdapter};

use super::*;

#[derive(Default)]
struct NoopPrReviewClient;

#[async_trait::async_trait]
impl PrReviewClient for NoopPrReviewClient {
    async fn post_comment(&self, _pr_number: u64, _repo: Option<&str>, _body: &str) -> crate::error::CoordResult<String> {
        Ok("comment-1".to_owned())
    }

    async fn poll_for_bot_review(&self, _pr_number: u64, _repo: Option<&str>, _timeout: Duration) -> crate::error::CoordResult<bool> {
        Ok(false)
    }
}

fn test_app() -> (axum_test::TestServer, tempfile::TempDir) {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let (coordinator, dir) = test_coordinator(adapter);
    let app_state = AppState { coordinator: Arc::new(coordinator), pr_review_client: Arc::new(NoopPrReviewClient) };
    let server = axum_test::TestServer::new(router(app_state)).expect("build test server");
    (server, dir)
}

#[tokio::test]
async fn health_reports_ok() {
    let (server, _dir) = test_app();
    let resp = server.get("/health").await;
    resp.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn create_then_get_session_round_trips() {
    let (server, _dir) = test_app();
    let resp = server.post("/sessions").json(&serde_json::json!({ "working_dir": "/tmp" })).await;
    resp.assert_status(StatusCode::OK);
    let created: Session = resp.json();
    assert_eq!(created.provider, ProviderTag::Claude);

    let fetched = server.get(&format!("/sessions/{}", created.id)).await;
    fetched.assert_status(StatusCode::OK);
    let fetched: Session = fetched.json();
    assert_eq!(fetched.id, created.id);
}

#[tokio::test]
async fn get_unknown_session_is_404() {
    let (server, _dir) = test_app();
    let resp = server.get("/sessions/ffffffff").await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_sets_friendly_name_and_em_flag() {
    let (server, _dir) = test_app();
    let created: Session = server.post("/sessions").json(&serde_json::json!({ "working_dir": "/tmp" })).await.json();

    let resp = server.patch(&format!("/sessions/{}", created.id)).json(&serde_json::json!({ "friendly_name": "scout", "is_em": true })).await;
    resp.assert_status(StatusCode::OK);
    let updated: Session = resp.json();
    assert_eq!(updated.friendly_name.as_deref(), Some("scout"));
    assert!(updated.is_em);
}

#[tokio::test]
async fn delete_by_operator_removes_session() {
    let (server, _dir) = test_app();
    let created: Session = server.post("/sessions").json(&serde_json::json!({ "working_dir": "/tmp" })).await.json();

    let resp = server.delete(&format!("/sessions/{}", created.id)).await;
    resp.assert_status(StatusCode::OK);

    let fetched = server.get(&format!("/sessions/{}", created.id)).await;
    fetched.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_by_non_parent_caller_is_forbidden() {
    let (server, _dir) = test_app();
    let target: Session = server.post("/sessions").json(&serde_json::json!({ "working_dir": "/tmp" })).await.json();
    let stranger: Session = server.post("/sessions").json(&serde_json::json!({ "working_dir": "/tmp" })).await.json();

    let resp = server.delete(&format!("/sessions/{}", target.id)).json(&serde_json::json!({ "caller": stranger.id })).await;
    resp.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn queue_input_returns_queued_outcome() {
    let (server, _dir) = test_app();
    let created: Session = server.post("/sessions").json(&serde_json::json!({ "working_dir": "/tmp" })).await.json();

    let resp = server.post(&format!("/sessions/{}/input", created.id)).json(&serde_json::json!({ "text": "hello", "mode": "sequential" })).await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "queued");
}

#[tokio::test]
async fn clear_session_arms_fence_and_clears_output() {
    let (server, _dir) = test_app();
    let created: Session = server.post("/sessions").json(&serde_json::json!({ "working_dir": "/tmp" })).await.json();

    let resp = server.post(&format!("/sessions/{}/clear", created.id)).await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "cleared");
}

#[tokio::test]
async fn handoff_records_pending_path() {
    let (server, _dir) = test_app();
    let created: Session = server.post("/sessions").json(&serde_json::json!({ "working_dir": "/tmp" })).await.json();

    let resp = server.post(&format!("/sessions/{}/handoff", created.id)).json(&serde_json::json!({ "path": "/tmp/handoff.txt" })).await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "handoff-pending");
}

#[tokio::test]
async fn handoff_on_unknown_session_is_404() {
    let (server, _dir) = test_app();
    let resp = server.post("/sessions/ghost/handoff").json(&serde_json::json!({ "path": "/tmp/handoff.txt" })).await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_records_text() {
    let (server, _dir) = test_app();
    let created: Session = server.post("/sessions").json(&serde_json::json!({ "working_dir": "/tmp" })).await.json();

    let resp = server.post(&format!("/sessions/{}/status", created.id)).json(&serde_json::json!({ "text": "writing tests" })).await;
    resp.assert_status(StatusCode::OK);

    let fetched: Session = server.get(&format!("/sessions/{}", created.id)).await.json();
    assert_eq!(fetched.status_text.map(|s| s.text), Some("writing tests".to_owned()));
}

#[tokio::test]
async fn hook_agent_always_returns_ok_even_for_unknown_session() {
    let (server, _dir) = test_app();
    let resp = server
        .post("/hooks/agent")
        .json(&serde_json::json!({ "event": "pre-tool-use", "session_id": "ghost", "tool_name": "Bash" }))
        .await;
    resp.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn pr_review_posts_comment_via_client() {
    let (server, _dir) = test_app();
    let resp = server.post("/reviews/pr").json(&serde_json::json!({ "pr_number": 42 })).await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["comment_id"], "comment-1");
}
