//! Shared test fakes used across the coordinator crate's unit tests.
#![cfg(test)]

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use termio::{AdapterError, Keystroke, PaneInfo, TerminalAdapter};

use clap::Parser;

use crate::audit::AuditLog;
use crate::config::Config;
use crate::forum::RecordingForumNotifier;
use crate::queue::{MessageQueue, MessageQueueConfig};
use crate::registry::SessionRegistry;
use crate::state::Coordinator;

/// Builds a [`MessageQueue`] wired to an in-memory registry and recording
/// forum notifier, with short-but-nonzero timings, for queue/delivery tests.
pub fn test_queue(adapter: Arc<dyn TerminalAdapter>) -> Arc<MessageQueue> {
    let registry = Arc::new(SessionRegistry::new(adapter.clone()));
    Arc::new(MessageQueue::new(
        registry,
        adapter,
        Arc::new(RecordingForumNotifier::default()),
        Arc::new(AuditLog::new(None)),
        MessageQueueConfig {
            input_poll_interval: Duration::from_millis(10),
            input_stale_timeout: Duration::from_millis(20),
            skip_fence_window: Duration::from_secs(8),
            remind_soft: Duration::from_millis(50),
            remind_hard: Duration::from_millis(100),
        },
    ))
}

/// Builds a full [`Coordinator`] over default config, rooted at a freshly
/// created temp directory so the audit log and snapshot file never touch the
/// test runner's real working directory. The returned `TempDir` must be kept
/// alive for as long as the `Coordinator` is used.
pub fn test_coordinator(adapter: Arc<dyn TerminalAdapter>) -> (Coordinator, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let mut config = Config::parse_from(["coordinatord"]);
    config.audit_dir = dir.path().join("audit");
    config.state_file = dir.path().join("state.json");
    let coordinator = Coordinator::new(&config, adapter, Arc::new(RecordingForumNotifier::default()));
    (coordinator, dir)
}

/// No-op terminal adapter: every call succeeds and does nothing observable.
/// Good enough for tests that only care about registry/session bookkeeping.
pub struct FakeAdapter;

impl TerminalAdapter for FakeAdapter {
    fn create_pane<'a>(
        &'a self,
        _name: &'a str,
        _working_dir: &'a str,
        _env: &'a [(String, String)],
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    fn kill_pane<'a>(
        &'a self,
        _name: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    fn send_keys<'a>(
        &'a self,
        _name: &'a str,
        _keys: &'a [Keystroke],
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    fn capture<'a>(
        &'a self,
        _name: &'a str,
        _lines: usize,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<String>, AdapterError>> + Send + 'a>> {
        Box::pin(async { Ok(vec![]) })
    }

    fn list_panes<'a>(
        &'a self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<PaneInfo>, AdapterError>> + Send + 'a>> {
        Box::pin(async { Ok(vec![]) })
    }

    fn set_env<'a>(
        &'a self,
        _name: &'a str,
        _key: &'a str,
        _value: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }
}

/// Records every `send_keys` call's concatenated text for assertions.
#[derive(Default)]
pub struct RecordingAdapter {
    pub sends: Mutex<Vec<(String, Vec<u8>)>>,
    pub captures: Mutex<Vec<String>>,
}

/// Scripted capture responses for exercising the pending-user-input guard:
/// each `capture` call pops the next frame, repeating the last one once the
/// script is exhausted so a test doesn't need to pad it to the exact call
/// count a poll loop will make.
#[derive(Default)]
pub struct ScriptedAdapter {
    pub script: Mutex<std::collections::VecDeque<Vec<String>>>,
    pub sends: Mutex<Vec<(String, Vec<u8>)>>,
}

impl ScriptedAdapter {
    pub fn new(frames: Vec<Vec<String>>) -> Self {
        Self { script: Mutex::new(frames.into()), sends: Mutex::new(Vec::new()) }
    }
}

impl TerminalAdapter for ScriptedAdapter {
    fn create_pane<'a>(
        &'a self,
        _name: &'a str,
        _working_dir: &'a str,
        _env: &'a [(String, String)],
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    fn kill_pane<'a>(
        &'a self,
        _name: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    fn send_keys<'a>(
        &'a self,
        name: &'a str,
        keys: &'a [Keystroke],
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(async move {
            let mut bytes = Vec::new();
            for key in keys {
                bytes.extend_from_slice(&key.bytes);
            }
            self.sends.lock().unwrap().push((name.to_owned(), bytes));
            Ok(())
        })
    }

    fn capture<'a>(
        &'a self,
        _name: &'a str,
        _lines: usize,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<String>, AdapterError>> + Send + 'a>> {
        Box::pin(async move {
            let mut script = self.script.lock().unwrap();
            let frame = if script.len() > 1 { script.pop_front().unwrap() } else { script.front().cloned().unwrap_or_default() };
            Ok(frame)
        })
    }

    fn list_panes<'a>(
        &'a self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<PaneInfo>, AdapterError>> + Send + 'a>> {
        Box::pin(async { Ok(vec![]) })
    }

    fn set_env<'a>(
        &'a self,
        _name: &'a str,
        _key: &'a str,
        _value: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }
}

impl TerminalAdapter for RecordingAdapter {
    fn create_pane<'a>(
        &'a self,
        _name: &'a str,
        _working_dir: &'a str,
        _env: &'a [(String, String)],
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    fn kill_pane<'a>(
        &'a self,
        _name: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    fn send_keys<'a>(
        &'a self,
        name: &'a str,
        keys: &'a [Keystroke],
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(async move {
            let mut bytes = Vec::new();
            for key in keys {
                bytes.extend_from_slice(&key.bytes);
            }
            self.sends.lock().unwrap().push((name.to_owned(), bytes));
            Ok(())
        })
    }

    fn capture<'a>(
        &'a self,
        name: &'a str,
        _lines: usize,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<String>, AdapterError>> + Send + 'a>> {
        self.captures.lock().unwrap().push(name.to_owned());
        Box::pin(async { Ok(vec![]) })
    }

    fn list_panes<'a>(
        &'a self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<PaneInfo>, AdapterError>> + Send + 'a>> {
        Box::pin(async { Ok(vec![]) })
    }

    fn set_env<'a>(
        &'a self,
        _name: &'a str,
        _key: &'a str,
        _value: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }
}
