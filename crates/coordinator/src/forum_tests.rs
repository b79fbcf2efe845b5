use super::*;
use crate::error::{CoordError, ErrorKind};

struct FailingNotifier;

#[async_trait::async_trait]
impl ForumNotifier for FailingNotifier {
    async fn create_thread(&self, _chat: &str, _title: &str) -> CoordResult<String> {
        Err(CoordError::new(ErrorKind::ForumTransient, "unreachable"))
    }
    async fn close_thread(&self, _chat: &str, _thread: &str) -> CoordResult<()> {
        Err(CoordError::new(ErrorKind::ForumTransient, "unreachable"))
    }
    async fn delete_thread(&self, _chat: &str, _thread: &str) -> CoordResult<()> {
        Err(CoordError::new(ErrorKind::ForumTransient, "unreachable"))
    }
    async fn send(&self, _chat: &str, _thread: Option<&str>, _text: &str, _reply_to: Option<&str>) -> CoordResult<()> {
        Err(CoordError::new(ErrorKind::ForumTransient, "unreachable"))
    }
}

#[tokio::test]
async fn best_effort_helpers_swallow_errors() {
    let notifier = FailingNotifier;
    best_effort_send(&notifier, "chat", Some("thread"), "hello").await;
    best_effort_close(&notifier, "chat", "thread").await;
    best_effort_delete(&notifier, "chat", "thread").await;
}

#[tokio::test]
async fn recording_notifier_records_every_call() {
    let notifier = RecordingForumNotifier::default();
    let thread = notifier.create_thread("chat-1", "title").await.unwrap();
    notifier.send("chat-1", Some(&thread), "hi", None).await.unwrap();
    notifier.close_thread("chat-1", &thread).await.unwrap();

    assert_eq!(notifier.created.lock().unwrap().len(), 1);
    assert_eq!(notifier.sent.lock().unwrap()[0].2, "hi");
    assert_eq!(notifier.closed.lock().unwrap()[0].1, thread);
}
