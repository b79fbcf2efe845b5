// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool-audit log (spec §6): append-only, single-writer, JSONL-backed. Not a
//! SQL database — the schema is small and the access pattern is pure
//! append-plus-tail-scan, so a flat file with an in-process index is enough.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::session::chrono_stub::Timestamp;

/// One row of the tool-audit schema (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEvent {
    pub id: u64,
    pub timestamp_utc: Timestamp,
    pub session_id: String,
    pub tool_name: String,
    pub tool_input_json: serde_json::Value,
    #[serde(default)]
    pub tool_response_json: Option<serde_json::Value>,
    pub tool_use_id: String,
    pub cwd: String,
    pub is_destructive: bool,
    #[serde(default)]
    pub target_file: Option<String>,
    #[serde(default)]
    pub bash_command: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i32>,
}

/// Append-only JSONL tool-audit log, one file per coordinator instance.
pub struct AuditLog {
    path: Option<PathBuf>,
    next_id: AtomicU64,
    write_lock: Mutex<()>,
}

pub(crate) fn is_destructive_tool(tool_name: &str) -> bool {
    matches!(tool_name, "Bash" | "Write" | "Edit" | "MultiEdit" | "NotebookEdit")
}

impl AuditLog {
    /// `dir` is created if missing; events are appended to `tool-events.jsonl`
    /// inside it. `None` disables persistence (unit tests).
    pub fn new(dir: Option<&Path>) -> Self {
        let path = dir.map(|d| {
            let _ = std::fs::create_dir_all(d);
            d.join("tool-events.jsonl")
        });
        Self { path, next_id: AtomicU64::new(1), write_lock: Mutex::new(()) }
    }

    /// Records the event and dispatches the append write to the blocking
    /// pool (spec §5: no blocking I/O on the event loop) — callers hold this
    /// behind an `Arc`, so the write runs off-thread without borrowing `self`.
    pub async fn record(
        self: &Arc<Self>,
        session_id: &str,
        tool_name: &str,
        tool_input_json: serde_json::Value,
        tool_use_id: &str,
        cwd: &str,
        now: Timestamp,
    ) -> ToolEvent {
        let event = ToolEvent {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            timestamp_utc: now,
            session_id: session_id.to_owned(),
            tool_name: tool_name.to_owned(),
            is_destructive: is_destructive_tool(tool_name),
            target_file: tool_input_json.get("file_path").and_then(|v| v.as_str()).map(str::to_owned),
            bash_command: tool_input_json.get("command").and_then(|v| v.as_str()).map(str::to_owned),
            tool_input_json,
            tool_response_json: None,
            tool_use_id: tool_use_id.to_owned(),
            cwd: cwd.to_owned(),
            exit_code: None,
        };
        let log = self.clone();
        let to_write = event.clone();
        if tokio::task::spawn_blocking(move || log.append(&to_write)).await.is_err() {
            warn!(session = session_id, "audit append task panicked");
        }
        event
    }

    fn append(&self, event: &ToolEvent) {
        let Some(ref path) = self.path else { return };
        let Ok(mut line) = serde_json::to_string(event) else { return };
        line.push('\n');
        let _guard = self.write_lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(path) else { return };
        let _ = file.write_all(line.as_bytes());
    }

    /// Last N events for a session, most recent last, used by the parent-wake
    /// digest (spec §4.5). All timestamps are UTC already.
    pub async fn last_n_for_session(self: &Arc<Self>, session_id: &str, n: usize) -> Vec<ToolEvent> {
        let log = self.clone();
        let session_id = session_id.to_owned();
        tokio::task::spawn_blocking(move || log.last_n_for_session_blocking(&session_id, n)).await.unwrap_or_default()
    }

    fn last_n_for_session_blocking(&self, session_id: &str, n: usize) -> Vec<ToolEvent> {
        let Some(ref path) = self.path else { return vec![] };
        let Ok(contents) = std::fs::read_to_string(path) else { return vec![] };
        let mut matching: Vec<ToolEvent> = contents
            .lines()
            .filter_map(|line| serde_json::from_str::<ToolEvent>(line).ok())
            .filter(|e| e.session_id == session_id)
            .collect();
        let start = matching.len().saturating_sub(n);
        matching.split_off(start)
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
