// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Coordinator runtime configuration (spec §6 "Configuration").
#[derive(Debug, Parser, Clone)]
#[command(name = "coordinatord", version, about = "Agent fleet coordinator.")]
pub struct Config {
    /// HTTP port to listen on for the RPC surface.
    #[arg(long, env = "COORD_PORT", default_value = "4170")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "COORD_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Path to the persisted state snapshot file.
    #[arg(long, env = "COORD_STATE_FILE", default_value = "coordinator-state.json")]
    pub state_file: PathBuf,

    /// Directory for the append-only tool-audit log.
    #[arg(long, env = "COORD_AUDIT_DIR", default_value = "coordinator-audit")]
    pub audit_dir: PathBuf,

    /// Default forum chat id used for auto-created threads when the caller
    /// doesn't supply one.
    #[arg(long, env = "COORD_DEFAULT_FORUM_CHAT")]
    pub default_forum_chat: Option<String>,

    /// Idle silence threshold before the Pane Output Monitor fires a
    /// one-shot idle notification.
    #[arg(long, env = "COORD_IDLE_TIMEOUT_SECONDS", default_value = "300")]
    pub idle_timeout_seconds: u64,

    /// Watcher poll cadence.
    #[arg(long, env = "COORD_WATCH_POLL_INTERVAL_SECONDS", default_value = "2")]
    pub watch_poll_interval_seconds: u64,

    /// Skip-fence absorption window.
    #[arg(long, env = "COORD_SKIP_FENCE_WINDOW_SECONDS", default_value = "8")]
    pub skip_fence_window_seconds: u64,

    /// Pending-user-input poll cadence.
    #[arg(long, env = "COORD_INPUT_POLL_INTERVAL_SECONDS", default_value = "5")]
    pub input_poll_interval_seconds: u64,

    /// Pending-user-input staleness threshold before it's saved and
    /// overwritten.
    #[arg(long, env = "COORD_INPUT_STALE_TIMEOUT_SECONDS", default_value = "120")]
    pub input_stale_timeout_seconds: u64,

    /// Reminder soft deadline (status nudge).
    #[arg(long, env = "COORD_REMIND_SOFT_SECONDS", default_value = "210")]
    pub remind_soft_seconds: u64,

    /// Reminder hard deadline (overdue notice).
    #[arg(long, env = "COORD_REMIND_HARD_SECONDS", default_value = "420")]
    pub remind_hard_seconds: u64,

    /// Review menu settle delay (codex provider).
    #[arg(long, env = "COORD_REVIEW_MENU_SETTLE_SECONDS", default_value = "1.0")]
    pub review_menu_settle_seconds: f64,

    /// Review branch-list settle delay.
    #[arg(long, env = "COORD_REVIEW_BRANCH_SETTLE_SECONDS", default_value = "1.0")]
    pub review_branch_settle_seconds: f64,

    /// Review steer-text injection delay.
    #[arg(long, env = "COORD_REVIEW_STEER_DELAY_SECONDS", default_value = "5.0")]
    pub review_steer_delay_seconds: f64,

    /// Log format (json or text).
    #[arg(long, env = "COORD_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "COORD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Base URL of the forum/chat notifier backend. When unset, the
    /// coordinator runs with an in-memory recording notifier (no forum
    /// side effects leave the process).
    #[arg(long, env = "COORD_FORUM_BASE_URL")]
    pub forum_base_url: Option<String>,

    /// Bearer token for the forum/chat notifier backend.
    #[arg(long, env = "COORD_FORUM_AUTH_TOKEN")]
    pub forum_auth_token: Option<String>,

    /// GitHub API token for the `pr` review path.
    #[arg(long, env = "COORD_GITHUB_TOKEN")]
    pub github_token: Option<String>,

    /// Login of the bot account whose PR reviews `poll_for_bot_review` waits for.
    #[arg(long, env = "COORD_GITHUB_BOT_LOGIN", default_value = "codex")]
    pub github_bot_login: String,
}

impl Config {
    /// Validate the configuration after parsing (spec §7 config-invalid
    /// refuses startup).
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.remind_hard_seconds <= self.remind_soft_seconds {
            anyhow::bail!("remind-hard-seconds must be greater than remind-soft-seconds");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    pub fn watch_poll_interval(&self) -> Duration {
        Duration::from_secs(self.watch_poll_interval_seconds)
    }

    pub fn skip_fence_window(&self) -> Duration {
        Duration::from_secs(self.skip_fence_window_seconds)
    }

    pub fn input_poll_interval(&self) -> Duration {
        Duration::from_secs(self.input_poll_interval_seconds)
    }

    pub fn input_stale_timeout(&self) -> Duration {
        Duration::from_secs(self.input_stale_timeout_seconds)
    }

    pub fn remind_soft(&self) -> Duration {
        Duration::from_secs(self.remind_soft_seconds)
    }

    pub fn remind_hard(&self) -> Duration {
        Duration::from_secs(self.remind_hard_seconds)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
