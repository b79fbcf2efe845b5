// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tmux(1)`-backed [`TerminalAdapter`]. Each pane is a detached tmux
//! session named after the pane, so "pane" and "tmux session" are the same
//! identifier throughout this module.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::adapter::{PaneInfo, TerminalAdapter};
use crate::error::AdapterError;
use crate::keys::Keystroke;

/// Wall-clock budget for a keystroke send (spec §5).
const SEND_KEYS_TIMEOUT: Duration = Duration::from_secs(5);
/// Wall-clock budget for a pane capture (spec §5).
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(3);

/// Adapter backed by the `tmux` binary on `$PATH`.
pub struct TmuxAdapter {
    tmux_bin: String,
}

impl Default for TmuxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TmuxAdapter {
    pub fn new() -> Self {
        Self { tmux_bin: "tmux".to_owned() }
    }

    /// Override the tmux binary path (used in tests with a fake binary).
    pub fn with_binary(tmux_bin: impl Into<String>) -> Self {
        Self { tmux_bin: tmux_bin.into() }
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output, AdapterError> {
        let fut = Command::new(&self.tmux_bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();
        match tokio::time::timeout(CAPTURE_TIMEOUT.max(SEND_KEYS_TIMEOUT), fut).await {
            Ok(Ok(out)) => Ok(out),
            Ok(Err(e)) => Err(AdapterError::Backend(e.to_string())),
            Err(_) => Err(AdapterError::Timeout),
        }
    }

    async fn run_checked(&self, args: &[&str]) -> Result<(), AdapterError> {
        let out = self.run(args).await?;
        if out.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&out.stderr);
            if stderr.contains("can't find") || stderr.contains("no server") {
                Err(AdapterError::PaneGone)
            } else {
                Err(AdapterError::Backend(stderr.trim().to_owned()))
            }
        }
    }
}

impl TerminalAdapter for TmuxAdapter {
    fn create_pane<'a>(
        &'a self,
        name: &'a str,
        working_dir: &'a str,
        env: &'a [(String, String)],
    ) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(async move {
            self.run_checked(&["new-session", "-d", "-s", name, "-c", working_dir]).await?;
            for (key, value) in env {
                self.run_checked(&["set-environment", "-t", name, key, value]).await?;
            }
            debug!(pane = name, "created pane");
            Ok(())
        })
    }

    fn kill_pane<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(async move {
            match self.run_checked(&["kill-session", "-t", name]).await {
                Ok(()) | Err(AdapterError::PaneGone) => Ok(()),
                Err(e) => Err(e),
            }
        })
    }

    fn send_keys<'a>(
        &'a self,
        name: &'a str,
        keys: &'a [Keystroke],
    ) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(async move {
            let deadline = tokio::time::Instant::now() + SEND_KEYS_TIMEOUT;
            for key in keys {
                if tokio::time::Instant::now() > deadline {
                    return Err(AdapterError::Timeout);
                }
                let literal = String::from_utf8_lossy(&key.bytes).into_owned();
                self.run_checked(&["send-keys", "-l", "-t", name, &literal]).await?;
                if let Some(delay) = key.delay_after {
                    tokio::time::sleep(delay).await;
                }
            }
            Ok(())
        })
    }

    fn capture<'a>(
        &'a self,
        name: &'a str,
        lines: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, AdapterError>> + Send + 'a>> {
        Box::pin(async move {
            let start = format!("-{lines}");
            let out = self.run(&["capture-pane", "-p", "-t", name, "-S", &start]).await?;
            if !out.status.success() {
                let stderr = String::from_utf8_lossy(&out.stderr);
                if stderr.contains("can't find") {
                    return Err(AdapterError::PaneGone);
                }
                warn!(pane = name, %stderr, "capture-pane failed");
                return Err(AdapterError::Backend(stderr.trim().to_owned()));
            }
            let text = String::from_utf8_lossy(&out.stdout);
            Ok(text.lines().map(str::to_owned).collect())
        })
    }

    fn list_panes<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PaneInfo>, AdapterError>> + Send + 'a>> {
        Box::pin(async move {
            let out = self
                .run(&["list-sessions", "-F", "#{session_name}\t#{pane_current_path}"])
                .await?;
            if !out.status.success() {
                // No server running means no panes — not an error.
                let stderr = String::from_utf8_lossy(&out.stderr);
                if stderr.contains("no server") {
                    return Ok(vec![]);
                }
                return Err(AdapterError::Backend(stderr.trim().to_owned()));
            }
            let text = String::from_utf8_lossy(&out.stdout);
            Ok(text
                .lines()
                .filter_map(|line| {
                    let mut parts = line.splitn(2, '\t');
                    let name = parts.next()?.to_owned();
                    let working_dir = parts.next().map(str::to_owned);
                    Some(PaneInfo { name, working_dir })
                })
                .collect())
        })
    }

    fn set_env<'a>(
        &'a self,
        name: &'a str,
        key: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(async move { self.run_checked(&["set-environment", "-t", name, key, value]).await })
    }
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
