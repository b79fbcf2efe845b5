// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pane Output Monitor: polls each live pane's captured output, classifies
//! newly-appeared content, and emits events. Does not decide `is-idle` —
//! that's the hook/idle-prompt responsibility upstream (spec §4.2).

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::adapter::TerminalAdapter;

/// Tunables for the monitor loop (spec §6 `idle_timeout_seconds`,
/// `watch_poll_interval_seconds` reused here for the poll cadence).
#[derive(Debug, Clone)]
pub struct PaneMonitorConfig {
    pub poll_interval: Duration,
    pub idle_timeout: Duration,
    pub capture_lines: usize,
}

impl Default for PaneMonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(300),
            capture_lines: 200,
        }
    }
}

/// An event classified from newly-appeared pane content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedEvent {
    CrashSignature { snippet: String },
    PermissionPrompt,
    Completion,
    Idle,
}

struct PaneState {
    last_lines: Vec<String>,
    last_activity: Instant,
    last_permission_hash: Option<u64>,
    idle_fired: bool,
}

impl PaneState {
    fn new(now: Instant) -> Self {
        Self { last_lines: Vec::new(), last_activity: now, last_permission_hash: None, idle_fired: false }
    }
}

/// Ordered pattern tests applied to newly-appeared content, one tier each.
struct Patterns {
    crash: Vec<Regex>,
    permission: Vec<Regex>,
    completion: Vec<Regex>,
}

impl Default for Patterns {
    fn default() -> Self {
        Self {
            crash: vec![
                Regex::new(r"(?i)panicked at|stack overflow|segmentation fault|fatal error").unwrap(),
                Regex::new(r"(?i)unhandled (?:promise )?rejection|uncaught exception").unwrap(),
            ],
            permission: vec![
                Regex::new(r"(?i)do you want to (?:proceed|allow|grant)").unwrap(),
                Regex::new(r"(?i)permission (?:denied|required)").unwrap(),
                Regex::new(r"\[y/n\]").unwrap(),
            ],
            completion: vec![
                Regex::new(r"(?i)^done\.?$").unwrap(),
                Regex::new(r"(?i)^complete\.?$").unwrap(),
                Regex::new(r"(?i)all tests passing").unwrap(),
            ],
        }
    }
}

fn hash_str(s: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

/// Polls panes through a [`TerminalAdapter`] and classifies new content.
pub struct PaneMonitor {
    adapter: Arc<dyn TerminalAdapter>,
    config: PaneMonitorConfig,
    patterns: Patterns,
    panes: Mutex<HashMap<String, PaneState>>,
}

impl PaneMonitor {
    pub fn new(adapter: Arc<dyn TerminalAdapter>, config: PaneMonitorConfig) -> Self {
        Self { adapter, config, patterns: Patterns::default(), panes: Mutex::new(HashMap::new()) }
    }

    /// Forget a pane's tracked state (called when a session is deleted).
    pub async fn forget(&self, pane: &str) {
        self.panes.lock().await.remove(pane);
    }

    /// Poll one pane once, returning classified events for any newly
    /// appeared content (ordered: crash, permission, completion, silence).
    pub async fn poll_once(&self, pane: &str) -> Vec<ClassifiedEvent> {
        let lines = match self.adapter.capture(pane, self.config.capture_lines).await {
            Ok(lines) => lines,
            Err(_) => return vec![],
        };

        let now = Instant::now();
        let mut panes = self.panes.lock().await;
        let state = panes.entry(pane.to_owned()).or_insert_with(|| PaneState::new(now));

        let changed = lines != state.last_lines;
        let new_text = if changed {
            diff_suffix(&state.last_lines, &lines).join("\n")
        } else {
            String::new()
        };

        if changed {
            state.last_lines = lines;
            state.last_activity = now;
            state.idle_fired = false;
        }

        let mut events = Vec::new();

        if changed && !new_text.is_empty() {
            if let Some(m) = self.patterns.crash.iter().find(|re| re.is_match(&new_text)) {
                let snippet = m.find(&new_text).map(|m| m.as_str().to_owned()).unwrap_or_default();
                events.push(ClassifiedEvent::CrashSignature { snippet });
            }

            if self.patterns.permission.iter().any(|re| re.is_match(&new_text)) {
                let hash = hash_str(&new_text);
                if state.last_permission_hash != Some(hash) {
                    state.last_permission_hash = Some(hash);
                    events.push(ClassifiedEvent::PermissionPrompt);
                }
            }

            if self.patterns.completion.iter().any(|re| re.is_match(new_text.trim())) {
                events.push(ClassifiedEvent::Completion);
            }
        }

        let silent_for = now.saturating_duration_since(state.last_activity);
        if !state.idle_fired && silent_for > self.config.idle_timeout {
            state.idle_fired = true;
            events.push(ClassifiedEvent::Idle);
        }

        events
    }
}

/// Return the suffix of `new` that isn't a prefix-overlap with `old`.
/// Falls back to the full new content if the pane was cleared/shrunk.
fn diff_suffix<'a>(old: &[String], new: &'a [String]) -> Vec<&'a str> {
    if new.len() >= old.len() && new[..old.len()] == old[..] {
        new[old.len()..].iter().map(String::as_str).collect()
    } else {
        new.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
