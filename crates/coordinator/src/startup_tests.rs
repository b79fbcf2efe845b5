use std::sync::Arc;

use crate::session::ProviderTag;
use crate::session::chrono_stub::Timestamp;
use crate::test_support::{test_coordinator, RecordingAdapter};

use super::*;

#[tokio::test]
async fn dead_session_is_dropped_and_recorded_as_orphan() {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let (coordinator, _dir) = test_coordinator(adapter.clone());
    let session = coordinator
        .registry
        .create("/tmp".into(), ProviderTag::Claude, None, None, Some("chat-1".into()), Timestamp::now())
        .await
        .unwrap();
    coordinator.registry.set_thread_id(&session.id, "thread-1".into()).await.unwrap();
    coordinator.persist_now().await;

    let orphans = load_and_prune(&coordinator, adapter.as_ref()).await;

    assert!(coordinator.registry.get(&session.id).await.is_none());
    assert_eq!(orphans, vec![("chat-1".to_owned(), "thread-1".to_owned())]);
}

#[tokio::test]
async fn finish_after_bind_backfills_and_creates_threads() {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let (coordinator, _dir) = test_coordinator(adapter);
    let session = coordinator
        .registry
        .create("/tmp".into(), ProviderTag::Claude, None, None, None, Timestamp::now())
        .await
        .unwrap();

    finish_after_bind(&coordinator, vec![("chat-1".to_owned(), "thread-1".to_owned())]).await;

    let updated = coordinator.registry.get(&session.id).await.unwrap();
    assert!(updated.chat_id.is_none(), "no default_forum_chat configured, backfill is a no-op");
}
