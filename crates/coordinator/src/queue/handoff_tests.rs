use std::sync::Arc;

use crate::session::chrono_stub::Timestamp;
use crate::session::ProviderTag;
use crate::test_support::RecordingAdapter;

use super::*;

#[tokio::test]
async fn execute_handoff_injects_file_contents_and_removes_file() {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let queue = crate::test_support::test_queue(adapter.clone());
    let session = queue.registry.create("/tmp".into(), ProviderTag::Claude, None, None, None, Timestamp::now()).await.unwrap();

    let dir = std::env::temp_dir().join(format!("handoff-{}", session.id));
    tokio::fs::write(&dir, "continue the task").await.unwrap();

    queue.execute_handoff(&session.id, dir.to_str().unwrap()).await;

    let sends = adapter.sends.lock().unwrap();
    let last = sends.last().expect("handoff injected a keystroke batch");
    let text = String::from_utf8_lossy(&last.1);
    assert!(text.contains("continue the task"));
    assert!(!dir.exists());
}

#[tokio::test]
async fn execute_handoff_skips_missing_file() {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let queue = crate::test_support::test_queue(adapter.clone());
    let session = queue.registry.create("/tmp".into(), ProviderTag::Claude, None, None, None, Timestamp::now()).await.unwrap();

    queue.execute_handoff(&session.id, "/nonexistent/path/handoff.txt").await;
    assert!(adapter.sends.lock().unwrap().is_empty());
}

#[tokio::test]
async fn execute_handoff_skips_empty_file() {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let queue = crate::test_support::test_queue(adapter.clone());
    let session = queue.registry.create("/tmp".into(), ProviderTag::Claude, None, None, None, Timestamp::now()).await.unwrap();

    let dir = std::env::temp_dir().join(format!("handoff-empty-{}", session.id));
    tokio::fs::write(&dir, "   \n").await.unwrap();

    queue.execute_handoff(&session.id, dir.to_str().unwrap()).await;
    assert!(adapter.sends.lock().unwrap().is_empty());
    let _ = tokio::fs::remove_file(&dir).await;
}
