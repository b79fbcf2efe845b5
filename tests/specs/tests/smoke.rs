// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `coordinatord` binary and
//! exercise its RPC surface over plain HTTP.

use std::net::TcpListener;
use std::process::{Command, Stdio};
use std::time::Duration;

use coordinator_specs::CoordinatorProcess;

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn health_reports_ok() -> anyhow::Result<()> {
    let coord = CoordinatorProcess::start()?;
    coord.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value = reqwest::get(format!("{}/health", coord.base_url())).await?.json().await?;
    assert_eq!(resp["status"], "ok");

    Ok(())
}

#[tokio::test]
async fn create_then_get_session_round_trips() -> anyhow::Result<()> {
    let coord = CoordinatorProcess::start()?;
    coord.wait_healthy(TIMEOUT).await?;

    let working_dir = tempfile::tempdir()?;
    let client = reqwest::Client::new();

    let created: serde_json::Value = client
        .post(format!("{}/sessions", coord.base_url()))
        .json(&serde_json::json!({
            "working_dir": working_dir.path().to_string_lossy(),
            "friendly_name": "smoke-session",
        }))
        .send()
        .await?
        .json()
        .await?;

    let id = created["id"].as_str().ok_or_else(|| anyhow::anyhow!("missing session id"))?;
    assert_eq!(created["friendly_name"], "smoke-session");

    let fetched: serde_json::Value =
        client.get(format!("{}/sessions/{id}", coord.base_url())).send().await?.json().await?;
    assert_eq!(fetched["id"], id);

    Ok(())
}

#[tokio::test]
async fn unknown_session_is_404() -> anyhow::Result<()> {
    let coord = CoordinatorProcess::start()?;
    coord.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let resp = client.get(format!("{}/sessions/deadbeef", coord.base_url())).send().await?;
    assert_eq!(resp.status().as_u16(), 404);

    Ok(())
}

#[tokio::test]
async fn delete_session_removes_it() -> anyhow::Result<()> {
    let coord = CoordinatorProcess::start()?;
    coord.wait_healthy(TIMEOUT).await?;

    let working_dir = tempfile::tempdir()?;
    let client = reqwest::Client::new();

    let created: serde_json::Value = client
        .post(format!("{}/sessions", coord.base_url()))
        .json(&serde_json::json!({ "working_dir": working_dir.path().to_string_lossy() }))
        .send()
        .await?
        .json()
        .await?;
    let id = created["id"].as_str().ok_or_else(|| anyhow::anyhow!("missing session id"))?;

    let resp = client.delete(format!("{}/sessions/{id}", coord.base_url())).send().await?;
    assert!(resp.status().is_success());

    let resp = client.get(format!("{}/sessions/{id}", coord.base_url())).send().await?;
    assert_eq!(resp.status().as_u16(), 404);

    Ok(())
}

#[tokio::test]
async fn queue_input_returns_queued_outcome() -> anyhow::Result<()> {
    let coord = CoordinatorProcess::start()?;
    coord.wait_healthy(TIMEOUT).await?;

    let working_dir = tempfile::tempdir()?;
    let client = reqwest::Client::new();

    let created: serde_json::Value = client
        .post(format!("{}/sessions", coord.base_url()))
        .json(&serde_json::json!({ "working_dir": working_dir.path().to_string_lossy() }))
        .send()
        .await?
        .json()
        .await?;
    let id = created["id"].as_str().ok_or_else(|| anyhow::anyhow!("missing session id"))?;

    let resp = client
        .post(format!("{}/sessions/{id}/input", coord.base_url()))
        .json(&serde_json::json!({ "text": "hello", "mode": "sequential" }))
        .send()
        .await?;
    assert!(resp.status().is_success());

    Ok(())
}

/// Startup-ordering property (P9/S6): the port bind must happen before any
/// forum side effect runs, so a crash-looping instance never issues a
/// forum call it can't back up by actually serving traffic. Holds the
/// target port open so `coordinatord`'s own bind fails deterministically,
/// and checks the process exits with the invalid-startup code rather than
/// reaching `axum::serve`. Serialized since it claims a literal TCP port
/// rather than an ephemeral one handed out by the OS.
#[tokio::test]
#[serial_test::serial]
async fn bind_failure_exits_before_startup_side_effects() -> anyhow::Result<()> {
    coordinator_specs::ensure_crypto();
    let binary = coordinator_specs::coordinatord_binary();
    anyhow::ensure!(binary.exists(), "coordinatord binary not found at {}", binary.display());

    let port = coordinator_specs::free_port()?;
    let _blocker = TcpListener::bind(("127.0.0.1", port))?;

    let state_dir = tempfile::tempdir()?;
    let state_file = state_dir.path().join("coordinator-state.json");
    let audit_dir = state_dir.path().join("audit");

    let mut child = Command::new(&binary)
        .args([
            "--host",
            "127.0.0.1",
            "--port",
            &port.to_string(),
            "--state-file",
            &state_file.to_string_lossy(),
            "--audit-dir",
            &audit_dir.to_string_lossy(),
            "--log-format",
            "text",
            "--log-level",
            "warn",
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    let status = loop {
        if tokio::time::Instant::now() > deadline {
            let _ = child.kill();
            anyhow::bail!("coordinatord did not exit after a bind failure");
        }
        if let Some(status) = child.try_wait()? {
            break status;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };

    assert_eq!(status.code(), Some(2));
    Ok(())
}

#[tokio::test]
async fn hook_agent_always_returns_ok() -> anyhow::Result<()> {
    let coord = CoordinatorProcess::start()?;
    coord.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/hooks/agent", coord.base_url()))
        .json(&serde_json::json!({
            "session_id": "deadbeef",
            "event": "stop",
        }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 200);

    Ok(())
}
