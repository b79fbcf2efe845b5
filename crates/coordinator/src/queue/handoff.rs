// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handoff chaining (spec glossary: "chaining a new task into the same
//! session via a file-path token read on the next stop hook"). Handoff
//! execution precedes any skip-fence absorption and any idle transition for
//! the stop hook that triggered it (spec §5 ordering guarantee 3).

use tracing::{info, warn};

use termio::Keystroke;

use super::MessageQueue;

impl MessageQueue {
    /// Read the handoff file at `path` and inject its contents as the
    /// session's next prompt, keeping the session RUNNING rather than
    /// transitioning it through idle.
    pub(crate) async fn execute_handoff(&self, session_id: &str, path: &str) {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!(session = session_id, path, error = %e, "handoff file unreadable, skipping continuation");
                return;
            }
        };
        let text = text.trim();
        if text.is_empty() {
            warn!(session = session_id, path, "handoff file empty, skipping continuation");
            return;
        }

        let Some(session) = self.registry.get(session_id).await else {
            warn!(session = session_id, "handoff target vanished before injection");
            return;
        };

        let keys = vec![Keystroke::text(text), Keystroke::enter()];
        if let Err(e) = self.adapter.send_keys(&session.pane_name, &keys).await {
            warn!(session = session_id, error = %e, "handoff injection failed");
            return;
        }
        let _ = tokio::fs::remove_file(path).await;
        info!(session = session_id, "handoff executed");
    }
}

#[cfg(test)]
#[path = "handoff_tests.rs"]
mod tests;
