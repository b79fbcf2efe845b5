// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The [`Session`] entity (spec §3) and its provider capability set
//! (spec §9: providers are handled by capability flags, not string compares).

use serde::{Deserialize, Serialize};

/// Provider tag a session runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderTag {
    Claude,
    CodexTmux,
    CodexApp,
}

/// How a provider reports turn completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdleDetectionStrategy {
    /// A `stop` hook callback is authoritative.
    StopHook,
    /// No hooks; fall back to a prompt-signature match on captured output.
    PromptSignature,
}

/// Per-provider capability flags the delivery engine and crash recovery
/// branch on, instead of comparing provider strings directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCaps {
    pub supports_stop_hook: bool,
    pub supports_steer: bool,
    pub supports_resume_token: bool,
    pub idle_detection_strategy: IdleDetectionStrategy,
}

impl ProviderTag {
    pub fn caps(self) -> ProviderCaps {
        match self {
            Self::Claude => ProviderCaps {
                supports_stop_hook: true,
                supports_steer: false,
                supports_resume_token: true,
                idle_detection_strategy: IdleDetectionStrategy::StopHook,
            },
            Self::CodexTmux => ProviderCaps {
                supports_stop_hook: false,
                supports_steer: true,
                supports_resume_token: false,
                idle_detection_strategy: IdleDetectionStrategy::PromptSignature,
            },
            Self::CodexApp => ProviderCaps {
                supports_stop_hook: false,
                supports_steer: true,
                supports_resume_token: false,
                idle_detection_strategy: IdleDetectionStrategy::PromptSignature,
            },
        }
    }
}

/// Lifecycle status (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Created,
    Running,
    Idle,
    Stopped,
    Error,
}

/// Terminal completion classification, set on delete/kill/task-complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionStatus {
    Completed,
    Error,
    Abandoned,
    Killed,
}

/// An agent-reported status line with its timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusText {
    pub text: String,
    pub at: chrono_stub::Timestamp,
}

/// Review configuration slot (populated by the Review Orchestrator, spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    pub mode: crate::review::ReviewMode,
    pub base: Option<String>,
    pub commit: Option<String>,
    pub custom: Option<String>,
    pub steer: Option<String>,
    pub delivered: bool,
    pub pr_number: Option<u64>,
    pub pr_repo: Option<String>,
    pub pr_comment_id: Option<String>,
}

/// The coordinator's record of one long-lived agent process (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub friendly_name: Option<String>,
    pub pane_name: String,
    pub working_dir: String,
    pub provider: ProviderTag,
    pub parent: Option<String>,
    pub status: SessionStatus,
    pub status_text: Option<StatusText>,
    pub last_tool_call_at: Option<chrono_stub::Timestamp>,
    pub spawn_prompt: Option<String>,
    pub created_at: chrono_stub::Timestamp,
    pub completion_status: Option<CompletionStatus>,
    pub is_em: bool,
    pub chat_id: Option<String>,
    pub thread_id: Option<String>,
    pub review: Option<ReviewConfig>,
    pub resume_token: Option<String>,
    #[serde(skip)]
    pub is_compacting: bool,
}

impl Session {
    pub fn pane_name_for(id: &str) -> String {
        format!("agent-{id}")
    }

    pub fn new(
        id: String,
        working_dir: String,
        provider: ProviderTag,
        parent: Option<String>,
        friendly_name: Option<String>,
        chat_id: Option<String>,
        now: chrono_stub::Timestamp,
    ) -> Self {
        Self {
            pane_name: Self::pane_name_for(&id),
            id,
            friendly_name,
            working_dir,
            provider,
            parent,
            status: SessionStatus::Created,
            status_text: None,
            last_tool_call_at: None,
            spawn_prompt: None,
            created_at: now,
            completion_status: None,
            is_em: false,
            chat_id,
            thread_id: None,
            review: None,
            resume_token: None,
            is_compacting: false,
        }
    }
}

/// Minimal UTC timestamp type. All persisted timestamps are ISO-8601 UTC
/// strings (spec §6); kept as a thin wrapper over epoch milliseconds so the
/// whole crate does a single, explicit UTC computation (spec §4.5's "all
/// relative-age calculations are done in UTC") without pulling in a
/// datetime crate the teacher workspace doesn't already carry.
pub mod chrono_stub {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct Timestamp(pub u64);

    impl Timestamp {
        pub fn now() -> Self {
            Self(
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis() as u64,
            )
        }

        pub fn from_epoch_ms(ms: u64) -> Self {
            Self(ms)
        }

        pub fn epoch_ms(self) -> u64 {
            self.0
        }

        /// Render as an ISO-8601 UTC string (`YYYY-MM-DDTHH:MM:SSZ`), computed
        /// by hand from epoch millis so age math never touches local time.
        pub fn to_iso8601_utc(self) -> String {
            let secs = self.0 / 1000;
            let (y, m, d, hh, mm, ss) = civil_from_unix(secs as i64);
            format!("{y:04}-{m:02}-{d:02}T{hh:02}:{mm:02}:{ss:02}Z")
        }

        /// Age relative to `now`, formatted as `"Nm ago"` (spec §4.5/§8 P6).
        pub fn relative_age_minutes(self, now: Timestamp) -> String {
            let diff_ms = now.0.saturating_sub(self.0);
            let minutes = diff_ms / 60_000;
            format!("{minutes}m ago")
        }
    }

    /// Howard Hinnant's days-from-civil algorithm, used in reverse
    /// (`civil_from_days`) to turn a Unix timestamp into UTC calendar fields
    /// without a datetime dependency.
    fn civil_from_unix(unix_secs: i64) -> (i64, u32, u32, u32, u32, u32) {
        let days = unix_secs.div_euclid(86_400);
        let rem = unix_secs.rem_euclid(86_400);
        let (hh, mm, ss) = (rem / 3600, (rem % 3600) / 60, rem % 60);
        let z = days + 719_468;
        let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
        let doe = (z - era * 146_097) as u64;
        let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
        let y = yoe as i64 + era * 400;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
        let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
        let y = if m <= 2 { y + 1 } else { y };
        (y, m, d, hh as u32, mm as u32, ss as u32)
    }

}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
