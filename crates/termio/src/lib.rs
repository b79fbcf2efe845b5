// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Facade over a terminal-multiplexer backend: create/kill panes, send
//! keystrokes, capture rendered output, and classify new pane content.
//!
//! The multiplexer backend itself (the process that actually owns PTYs) is
//! out of scope here — this crate only talks to it through [`TerminalAdapter`]
//! and a concrete `tmux(1)` implementation.

pub mod adapter;
pub mod error;
pub mod keys;
pub mod monitor;
pub mod tmux;

pub use adapter::{PaneInfo, TerminalAdapter};
pub use error::AdapterError;
pub use keys::{encode_key, Keystroke};
pub use monitor::{ClassifiedEvent, PaneMonitor, PaneMonitorConfig};
pub use tmux::TmuxAdapter;
