// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Errors surfaced by a [`crate::TerminalAdapter`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The named pane no longer exists.
    PaneGone,
    /// The call exceeded its wall-clock budget (see spec §5 Timeouts).
    Timeout,
    /// The backend process failed or its output could not be parsed.
    Backend(String),
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PaneGone => write!(f, "pane is gone"),
            Self::Timeout => write!(f, "adapter call timed out"),
            Self::Backend(msg) => write!(f, "backend error: {msg}"),
        }
    }
}

impl std::error::Error for AdapterError {}
