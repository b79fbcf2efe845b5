use std::sync::Arc;
use std::time::Duration;

use crate::session::chrono_stub::Timestamp;
use crate::session::{ProviderTag, SessionStatus};
use crate::test_support::RecordingAdapter;

use super::*;

#[tokio::test]
async fn watch_session_fires_idle_when_no_pane_target() {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let queue = crate::test_support::test_queue(adapter);
    let watcher = queue.registry.create("/tmp".into(), ProviderTag::Claude, None, None, None, Timestamp::now()).await.unwrap();

    queue.watch_session("ghost-session", &watcher.id, Duration::from_secs(5)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(queue.pending_count(&watcher.id).await, 1);
    let state = queue.state_for(&watcher.id).await;
    assert!(state.read().await.pending.front().unwrap().text.contains("idle"));
}

#[tokio::test]
async fn watch_session_times_out_when_never_idle() {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let queue = crate::test_support::test_queue(adapter);
    let watcher = queue.registry.create("/tmp".into(), ProviderTag::Claude, None, None, None, Timestamp::now()).await.unwrap();
    let target = queue.registry.create("/tmp".into(), ProviderTag::Claude, None, None, None, Timestamp::now()).await.unwrap();
    queue.registry.update_status(&target.id, SessionStatus::Running).await.unwrap();

    queue.watch_session(&target.id, &watcher.id, Duration::from_millis(30)).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(queue.pending_count(&watcher.id).await, 1);
    let state = queue.state_for(&watcher.id).await;
    assert!(state.read().await.pending.front().unwrap().text.contains("timeout"));
}

#[tokio::test]
async fn watch_session_fires_idle_on_prompt_detection_without_pending_messages() {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let queue = crate::test_support::test_queue(adapter.clone());
    let watcher = queue.registry.create("/tmp".into(), ProviderTag::Claude, None, None, None, Timestamp::now()).await.unwrap();
    let target = queue.registry.create("/tmp".into(), ProviderTag::Claude, None, None, None, Timestamp::now()).await.unwrap();
    queue.registry.update_status(&target.id, SessionStatus::Idle).await.unwrap();
    queue.state_for(&target.id).await.write().await.is_idle = true;
    // RecordingAdapter's capture() always returns an empty vec, so the
    // single-check tiebreaker never observes a prompt: this exercises the
    // suppress-on-no-prompt path and falls through to timeout.
    queue.watch_session(&target.id, &watcher.id, Duration::from_millis(30)).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    let state = queue.state_for(&watcher.id).await;
    assert!(state.read().await.pending.front().unwrap().text.contains("timeout"));
}
