// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::future::Future;
use std::pin::Pin;

use crate::error::AdapterError;
use crate::keys::Keystroke;

/// Metadata about one live pane, as enumerated by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneInfo {
    pub name: String,
    pub working_dir: Option<String>,
}

/// Uniform facade over a terminal-multiplexer backend.
///
/// Object-safe for use as `Box<dyn TerminalAdapter>`, matching the
/// `Box<dyn Backend>` shape the PTY backend trait uses elsewhere in this
/// codebase's lineage — async methods return a pinned boxed future instead
/// of using `async fn` in a trait so the trait stays object-safe.
pub trait TerminalAdapter: Send + Sync + 'static {
    /// Create a new named pane in `working_dir`, returning once the pane is
    /// live. `env` is applied before the pane's command starts.
    fn create_pane<'a>(
        &'a self,
        name: &'a str,
        working_dir: &'a str,
        env: &'a [(String, String)],
    ) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + 'a>>;

    /// Kill a pane by name. Idempotent: killing an already-gone pane is not
    /// an error at this layer (callers classify that as [`AdapterError::PaneGone`]
    /// only when they need to distinguish it).
    fn kill_pane<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + 'a>>;

    /// Send one or more keystrokes to a pane, in order, honoring each
    /// keystroke's `delay_after`. Budgeted at 5s wall-clock total (spec §5).
    fn send_keys<'a>(
        &'a self,
        name: &'a str,
        keys: &'a [Keystroke],
    ) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + 'a>>;

    /// Capture the latest `lines` lines of rendered pane output. Budgeted at
    /// 3s wall-clock (spec §5).
    fn capture<'a>(
        &'a self,
        name: &'a str,
        lines: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, AdapterError>> + Send + 'a>>;

    /// Enumerate all panes the backend currently knows about.
    fn list_panes<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PaneInfo>, AdapterError>> + Send + 'a>>;

    /// Set an environment variable inside a live pane (used to install
    /// `COORD_SESSION_ID` at creation time).
    fn set_env<'a>(
        &'a self,
        name: &'a str,
        key: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + 'a>>;
}
