use std::io::Write;
use std::os::unix::fs::PermissionsExt;

use super::*;

/// Write an executable shell script as a fake `tmux` binary.
fn fake_tmux(dir: &tempfile::TempDir, script: &str) -> String {
    let path = dir.path().join("tmux");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh\n{script}").unwrap();
    let mut perms = file.metadata().unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn create_pane_succeeds_on_zero_exit() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_tmux(&dir, "exit 0");
    let adapter = TmuxAdapter::with_binary(bin);
    let res = adapter.create_pane("agent-a1b2c3d4", "/tmp", &[]).await;
    assert!(res.is_ok());
}

#[tokio::test]
async fn create_pane_applies_env() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("calls.log");
    let bin = fake_tmux(&dir, &format!("echo \"$@\" >> {} ; exit 0", log.display()));
    let adapter = TmuxAdapter::with_binary(bin);
    let env = vec![("COORD_SESSION_ID".to_owned(), "a1b2c3d4".to_owned())];
    adapter.create_pane("agent-a1b2c3d4", "/tmp", &env).await.unwrap();
    let contents = std::fs::read_to_string(&log).unwrap();
    assert!(contents.contains("new-session"));
    assert!(contents.contains("set-environment"));
    assert!(contents.contains("COORD_SESSION_ID"));
}

#[tokio::test]
async fn kill_pane_is_idempotent_on_missing_session() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_tmux(&dir, "echo \"can't find session\" >&2; exit 1");
    let adapter = TmuxAdapter::with_binary(bin);
    assert!(adapter.kill_pane("agent-dead").await.is_ok());
}

#[tokio::test]
async fn capture_classifies_missing_pane_as_pane_gone() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_tmux(&dir, "echo \"can't find pane\" >&2; exit 1");
    let adapter = TmuxAdapter::with_binary(bin);
    let err = adapter.capture("agent-dead", 50).await.unwrap_err();
    assert_eq!(err, AdapterError::PaneGone);
}

#[tokio::test]
async fn capture_returns_lines() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_tmux(&dir, "printf 'line one\\nline two\\n'");
    let adapter = TmuxAdapter::with_binary(bin);
    let lines = adapter.capture("agent-a1b2c3d4", 50).await.unwrap();
    assert_eq!(lines, vec!["line one".to_owned(), "line two".to_owned()]);
}

#[tokio::test]
async fn list_panes_with_no_server_is_empty_not_error() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_tmux(&dir, "echo \"no server running\" >&2; exit 1");
    let adapter = TmuxAdapter::with_binary(bin);
    let panes = adapter.list_panes().await.unwrap();
    assert!(panes.is_empty());
}

#[tokio::test]
async fn list_panes_parses_name_and_cwd() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_tmux(&dir, "printf 'agent-a1b2c3d4\\t/home/a\\nagent-e5f6a7b8\\t/home/b\\n'");
    let adapter = TmuxAdapter::with_binary(bin);
    let panes = adapter.list_panes().await.unwrap();
    assert_eq!(panes.len(), 2);
    assert_eq!(panes[0].name, "agent-a1b2c3d4");
    assert_eq!(panes[0].working_dir.as_deref(), Some("/home/a"));
}

#[tokio::test]
async fn send_keys_honors_delay_after() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_tmux(&dir, "exit 0");
    let adapter = TmuxAdapter::with_binary(bin);
    let keys = vec![
        Keystroke::text("hello").with_delay(Duration::from_millis(5)),
        Keystroke::named("enter").unwrap(),
    ];
    let start = std::time::Instant::now();
    adapter.send_keys("agent-a1b2c3d4", &keys).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(5));
}
