use std::sync::Arc;

use crate::session::chrono_stub::Timestamp;
use crate::session::{ProviderTag, SessionStatus};
use crate::test_support::RecordingAdapter;

use super::*;

#[test]
fn classify_crash_matches_known_signatures() {
    assert!(classify_crash(&["thread 'main' panicked at 'boom'".to_owned()]));
    assert!(classify_crash(&["Segmentation fault (core dumped)".to_owned()]));
    assert!(!classify_crash(&["All tests passing".to_owned()]));
}

#[tokio::test]
async fn non_claude_sessions_never_enter_pending_recovery() {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let registry = Arc::new(SessionRegistry::new(adapter.clone()));
    let engine = CrashRecoveryEngine::new(registry.clone(), adapter);
    let session = registry.create("/tmp".into(), ProviderTag::CodexTmux, None, None, None, Timestamp::now()).await.unwrap();
    registry.update_status(&session.id, SessionStatus::Running).await.unwrap();

    engine.on_crash_detected(&session.id).await;
    assert!(!engine.is_pending_recovery(&session.id).await);
}

#[tokio::test]
async fn crash_while_running_defers_to_pending_recovery() {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let registry = Arc::new(SessionRegistry::new(adapter.clone()));
    let engine = CrashRecoveryEngine::new(registry.clone(), adapter.clone());
    let session = registry.create("/tmp".into(), ProviderTag::Claude, None, None, None, Timestamp::now()).await.unwrap();
    registry.update_status(&session.id, SessionStatus::Running).await.unwrap();

    engine.on_crash_detected(&session.id).await;

    assert!(engine.is_pending_recovery(&session.id).await);
    assert!(adapter.sends.lock().unwrap().is_empty());
}

#[tokio::test]
async fn crash_while_idle_recovers_immediately() {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let registry = Arc::new(SessionRegistry::new(adapter.clone()));
    let engine = CrashRecoveryEngine::new(registry.clone(), adapter.clone());
    let session = registry.create("/tmp".into(), ProviderTag::Claude, None, None, None, Timestamp::now()).await.unwrap();
    registry.update_status(&session.id, SessionStatus::Idle).await.unwrap();

    engine.on_crash_detected(&session.id).await;

    assert!(!engine.is_pending_recovery(&session.id).await);
    assert!(!adapter.sends.lock().unwrap().is_empty());
}

#[tokio::test]
async fn flush_pending_recovery_is_suppressed_while_awaiting_permission() {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let registry = Arc::new(SessionRegistry::new(adapter.clone()));
    let engine = CrashRecoveryEngine::new(registry.clone(), adapter.clone());
    let session = registry.create("/tmp".into(), ProviderTag::Claude, None, None, None, Timestamp::now()).await.unwrap();
    registry.update_status(&session.id, SessionStatus::Running).await.unwrap();
    engine.on_crash_detected(&session.id).await;
    engine.mark_awaiting_permission(&session.id).await;

    engine.flush_pending_recovery(&session.id).await;

    assert!(engine.is_pending_recovery(&session.id).await);
    assert!(adapter.sends.lock().unwrap().is_empty());
}

#[tokio::test]
async fn flush_pending_recovery_fires_once_permission_cleared() {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let registry = Arc::new(SessionRegistry::new(adapter.clone()));
    let engine = CrashRecoveryEngine::new(registry.clone(), adapter.clone());
    let session = registry.create("/tmp".into(), ProviderTag::Claude, None, None, None, Timestamp::now()).await.unwrap();
    registry.update_status(&session.id, SessionStatus::Running).await.unwrap();
    engine.on_crash_detected(&session.id).await;

    engine.flush_pending_recovery(&session.id).await;

    assert!(!engine.is_pending_recovery(&session.id).await);
    assert!(!adapter.sends.lock().unwrap().is_empty());
}

#[tokio::test]
async fn success_cooldown_suppresses_immediate_re_detection() {
    let adapter: Arc<RecordingAdapter> = Arc::new(RecordingAdapter::default());
    let registry = Arc::new(SessionRegistry::new(adapter.clone()));
    let engine = CrashRecoveryEngine::new(registry.clone(), adapter.clone());
    let session = registry.create("/tmp".into(), ProviderTag::Claude, None, None, None, Timestamp::now()).await.unwrap();
    registry.update_status(&session.id, SessionStatus::Idle).await.unwrap();

    engine.on_crash_detected(&session.id).await;
    let sends_after_first = adapter.sends.lock().unwrap().len();

    engine.on_crash_detected(&session.id).await;
    let sends_after_second = adapter.sends.lock().unwrap().len();

    assert_eq!(sends_after_first, sends_after_second, "second detection within cooldown must not recover again");
}
