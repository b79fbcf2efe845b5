// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Review Orchestrator (spec §4.9): drives the codex provider's interactive
//! `/review` menu through scripted keystrokes, or posts a GitHub PR comment
//! and polls for a bot review in the `pr` path (no pane involved).

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CoordError, CoordResult, ErrorKind};
use crate::registry::SessionRegistry;
use crate::session::{ReviewConfig, SessionStatus};
use termio::{Keystroke, TerminalAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewMode {
    Branch,
    Uncommitted,
    Commit,
    Custom,
    Pr,
}

/// Options accompanying `start_review` (spec §9: queue-message-style fixed
/// option set, no free-form dictionary).
#[derive(Debug, Clone, Default)]
pub struct ReviewOptions {
    pub base: Option<String>,
    pub commit: Option<String>,
    pub custom: Option<String>,
    pub steer: Option<String>,
    /// 0-based position of `base` in the provider's branch list, precomputed
    /// by the caller so the orchestrator can count arrow-downs precisely.
    pub branch_list_position: usize,
}

pub struct ReviewSettleTimings {
    pub menu_settle: Duration,
    pub branch_settle: Duration,
    pub steer_delay: Duration,
}

impl Default for ReviewSettleTimings {
    fn default() -> Self {
        Self {
            menu_settle: Duration::from_millis(1000),
            branch_settle: Duration::from_millis(1000),
            steer_delay: Duration::from_millis(5000),
        }
    }
}

/// Client for the external "post a GitHub PR review comment, then poll" path.
#[async_trait::async_trait]
pub trait PrReviewClient: Send + Sync {
    async fn post_comment(&self, pr_number: u64, repo: Option<&str>, body: &str) -> CoordResult<String>;
    async fn poll_for_bot_review(&self, pr_number: u64, repo: Option<&str>, timeout: Duration) -> CoordResult<bool>;
}

pub struct ReviewOrchestrator {
    adapter: Arc<dyn TerminalAdapter>,
    registry: Arc<SessionRegistry>,
    timings: ReviewSettleTimings,
}

impl ReviewOrchestrator {
    pub fn new(adapter: Arc<dyn TerminalAdapter>, registry: Arc<SessionRegistry>, timings: ReviewSettleTimings) -> Self {
        Self { adapter, registry, timings }
    }

    /// Start an in-pane review (branch/uncommitted/commit/custom). Marks the
    /// session active *before* the caller registers any watcher, so the
    /// watcher does not fire on the prior idle baseline.
    pub async fn start_review(&self, session_id: &str, mode: ReviewMode, options: ReviewOptions) -> CoordResult<()> {
        if mode == ReviewMode::Pr {
            return Err(CoordError::new(ErrorKind::ProviderRefused, "pr mode has no pane path"));
        }
        let session = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| CoordError::new(ErrorKind::UnknownSession, session_id))?;

        self.registry.update_status(session_id, SessionStatus::Running).await?;

        let keys = self.encode_menu_navigation(mode, &options);
        self.adapter
            .send_keys(&session.pane_name, &keys)
            .await
            .map_err(|e| CoordError::new(ErrorKind::PaneGone, e.to_string()))?;

        if let Some(entry) = self.registry.get_entry(session_id).await {
            entry.write().await.review = Some(ReviewConfig {
                mode,
                base: options.base,
                commit: options.commit,
                custom: options.custom,
                steer: options.steer,
                delivered: true,
                pr_number: None,
                pr_repo: None,
                pr_comment_id: None,
            });
        }
        info!(session = session_id, ?mode, "review started");
        Ok(())
    }

    fn encode_menu_navigation(&self, mode: ReviewMode, options: &ReviewOptions) -> Vec<Keystroke> {
        let mut keys = vec![Keystroke::text("/review"), Keystroke::enter().with_delay(self.timings.menu_settle)];

        match mode {
            ReviewMode::Branch => {
                for _ in 0..options.branch_list_position {
                    keys.push(Keystroke::down().with_delay(Duration::from_millis(50)));
                }
                keys.push(Keystroke::enter().with_delay(self.timings.branch_settle));
            }
            ReviewMode::Uncommitted | ReviewMode::Commit | ReviewMode::Custom => {
                keys.push(Keystroke::enter().with_delay(self.timings.branch_settle));
            }
            ReviewMode::Pr => unreachable!("pr mode filtered before encoding"),
        }

        if let Some(steer) = &options.steer {
            keys.push(Keystroke::text(steer).with_delay(self.timings.steer_delay));
            keys.push(Keystroke::enter());
        }
        keys
    }

    /// `pr` path: post `@codex review [for <steer>]` and poll the reviews API.
    pub async fn start_pr_review(
        &self,
        client: &dyn PrReviewClient,
        pr_number: u64,
        repo: Option<&str>,
        steer: Option<&str>,
        wait: Option<Duration>,
    ) -> CoordResult<(String, bool)> {
        let body = match steer {
            Some(s) => format!("@codex review for {s}"),
            None => "@codex review".to_owned(),
        };
        let comment_id = client.post_comment(pr_number, repo, &body).await?;
        let reviewed = match wait {
            Some(timeout) => client.poll_for_bot_review(pr_number, repo, timeout).await.unwrap_or_else(|e| {
                warn!(error = %e, "pr review poll failed, treating as not-yet-reviewed");
                false
            }),
            None => false,
        };
        Ok((comment_id, reviewed))
    }
}

/// GitHub-backed [`PrReviewClient`] for the `pr` path (spec §4.9): posts a
/// `@codex review` comment, then polls the pull request's reviews endpoint
/// for one authored by the bot account.
pub struct GitHubPrReviewClient {
    base_url: String,
    token: String,
    bot_login: String,
    client: Client,
    poll_interval: Duration,
}

impl GitHubPrReviewClient {
    pub fn new(token: String, bot_login: String) -> Self {
        let client = Client::builder().timeout(Duration::from_secs(10)).build().unwrap_or_default();
        Self { base_url: "https://api.github.com".to_owned(), token, bot_login, client, poll_interval: Duration::from_secs(5) }
    }

    fn repo_path(&self, repo: Option<&str>) -> CoordResult<String> {
        repo.map(str::to_owned).ok_or_else(|| CoordError::new(ErrorKind::ConfigInvalid, "repo required for pr review"))
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.token).header("User-Agent", "coordinatord")
    }
}

#[async_trait::async_trait]
impl PrReviewClient for GitHubPrReviewClient {
    async fn post_comment(&self, pr_number: u64, repo: Option<&str>, body: &str) -> CoordResult<String> {
        let repo = self.repo_path(repo)?;
        let url = format!("{}/repos/{repo}/issues/{pr_number}/comments", self.base_url);
        let req = self.client.post(url).json(&serde_json::json!({ "body": body }));
        let resp = self
            .apply_auth(req)
            .send()
            .await
            .map_err(|e| CoordError::new(ErrorKind::ForumTransient, e.to_string()))?
            .error_for_status()
            .map_err(|e| CoordError::new(ErrorKind::ForumTransient, e.to_string()))?;
        let value: serde_json::Value = resp.json().await.map_err(|e| CoordError::new(ErrorKind::ForumTransient, e.to_string()))?;
        value
            .get("id")
            .map(|id| id.to_string())
            .ok_or_else(|| CoordError::new(ErrorKind::ForumTransient, "missing comment id in response"))
    }

    async fn poll_for_bot_review(&self, pr_number: u64, repo: Option<&str>, timeout: Duration) -> CoordResult<bool> {
        let repo = self.repo_path(repo)?;
        let url = format!("{}/repos/{repo}/pulls/{pr_number}/reviews", self.base_url);
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let req = self.client.get(&url);
            let resp = self
                .apply_auth(req)
                .send()
                .await
                .map_err(|e| CoordError::new(ErrorKind::ForumTransient, e.to_string()))?
                .error_for_status()
                .map_err(|e| CoordError::new(ErrorKind::ForumTransient, e.to_string()))?;
            let reviews: Vec<serde_json::Value> = resp.json().await.map_err(|e| CoordError::new(ErrorKind::ForumTransient, e.to_string()))?;
            let found = reviews.iter().any(|r| r.get("user").and_then(|u| u.get("login")).and_then(|l| l.as_str()) == Some(self.bot_login.as_str()));
            if found {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(self.poll_interval.min(deadline.saturating_duration_since(tokio::time::Instant::now()))).await;
        }
    }
}

#[cfg(test)]
#[path = "review_tests.rs"]
mod tests;
