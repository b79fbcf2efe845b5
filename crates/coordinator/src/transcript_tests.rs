use tempfile::NamedTempFile;

use super::*;

fn write_jsonl(lines: &[&str]) -> NamedTempFile {
    let file = NamedTempFile::new().expect("create temp file");
    std::fs::write(file.path(), lines.join("\n")).expect("write temp file");
    file
}

#[test]
fn extract_assistant_text_joins_text_blocks() {
    let json: serde_json::Value = serde_json::from_str(
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hello"},{"type":"text","text":"world"}]}}"#,
    )
    .expect("valid json");
    assert_eq!(extract_assistant_text(&json), Some("hello\nworld".to_owned()));
}

#[test]
fn extract_assistant_text_ignores_tool_use_only_turn() {
    let json: serde_json::Value =
        serde_json::from_str(r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Bash"}]}}"#).expect("valid json");
    assert_eq!(extract_assistant_text(&json), None);
}

#[test]
fn extract_assistant_text_ignores_non_assistant_entries() {
    let json: serde_json::Value = serde_json::from_str(r#"{"type":"user","message":{"content":[{"type":"text","text":"hi"}]}}"#).expect("valid json");
    assert_eq!(extract_assistant_text(&json), None);
}

#[tokio::test]
async fn last_assistant_message_finds_most_recent_text_entry() {
    let file = write_jsonl(&[
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"first"}]}}"#,
        r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Bash"}]}}"#,
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"latest"}]}}"#,
    ]);
    let found = last_assistant_message(file.path().to_str().expect("utf8 path")).await;
    assert_eq!(found, Some("latest".to_owned()));
}

#[tokio::test]
async fn last_assistant_message_returns_none_for_missing_file() {
    assert_eq!(last_assistant_message("/nonexistent/path.jsonl").await, None);
}
