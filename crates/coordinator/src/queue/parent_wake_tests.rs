use std::sync::Arc;
use std::time::Duration;

use crate::session::chrono_stub::Timestamp;
use crate::session::{ProviderTag, StatusText};
use crate::test_support::RecordingAdapter;

use super::*;

#[tokio::test]
async fn fire_parent_wake_delivers_digest_with_status_and_age() {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let queue = crate::test_support::test_queue(adapter);
    let parent = queue.registry.create("/tmp".into(), ProviderTag::Claude, None, None, None, Timestamp::now()).await.unwrap();
    let child = queue
        .registry
        .create("/tmp".into(), ProviderTag::Claude, Some(parent.id.clone()), None, None, Timestamp::now())
        .await
        .unwrap();

    let status_at = Timestamp::from_epoch_ms(1_771_582_320_000);
    let entry = queue.registry.get_entry(&child.id).await.unwrap();
    entry.write().await.status_text = Some(StatusText { text: "writing tests".into(), at: status_at });
    drop(entry);

    queue.register_parent_wake(&child.id, &parent.id, Duration::from_secs(60), status_at).await;
    queue.fire_parent_wake(&child.id).await;

    assert_eq!(queue.pending_count(&parent.id).await, 1);
    let state = queue.state_for(&parent.id).await;
    let s = state.read().await;
    let digest = &s.pending.front().unwrap().text;
    assert!(digest.contains("writing tests"));
    assert!(digest.contains(&child.id));
}

#[tokio::test]
async fn fire_parent_wake_reports_no_status_when_absent() {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let queue = crate::test_support::test_queue(adapter);
    let parent = queue.registry.create("/tmp".into(), ProviderTag::Claude, None, None, None, Timestamp::now()).await.unwrap();
    let child = queue
        .registry
        .create("/tmp".into(), ProviderTag::Claude, Some(parent.id.clone()), None, None, Timestamp::now())
        .await
        .unwrap();

    queue.register_parent_wake(&child.id, &parent.id, Duration::from_secs(60), Timestamp::now()).await;
    queue.fire_parent_wake(&child.id).await;

    let state = queue.state_for(&parent.id).await;
    let s = state.read().await;
    assert!(s.pending.front().unwrap().text.contains("no status reported"));
}

#[tokio::test]
async fn cancel_parent_wake_marks_inactive_and_stops_task() {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let queue = crate::test_support::test_queue(adapter);
    let parent = queue.registry.create("/tmp".into(), ProviderTag::Claude, None, None, None, Timestamp::now()).await.unwrap();
    let child = queue
        .registry
        .create("/tmp".into(), ProviderTag::Claude, Some(parent.id.clone()), None, None, Timestamp::now())
        .await
        .unwrap();

    queue.register_parent_wake(&child.id, &parent.id, Duration::from_millis(30), Timestamp::now()).await;
    queue.cancel_parent_wake(&child.id).await;

    assert!(!queue.parent_wakes.read().await.get(&child.id).unwrap().is_active);
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(queue.pending_count(&parent.id).await, 0);
}
