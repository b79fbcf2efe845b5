// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use coordinator::config::Config;
use coordinator::forum::{ForumNotifier, HttpForumNotifier, RecordingForumNotifier};
use coordinator::http::{router, AppState};
use coordinator::review::{GitHubPrReviewClient, PrReviewClient};
use coordinator::startup::load_and_prune;
use coordinator::state::Coordinator;
use termio::tmux::TmuxAdapter;
use termio::TerminalAdapter;

struct NoopPrReviewClient;

#[async_trait::async_trait]
impl PrReviewClient for NoopPrReviewClient {
    async fn post_comment(&self, _pr_number: u64, _repo: Option<&str>, _body: &str) -> coordinator::error::CoordResult<String> {
        Err(coordinator::error::CoordError::new(coordinator::error::ErrorKind::ConfigInvalid, "no GitHub token configured"))
    }

    async fn poll_for_bot_review(&self, _pr_number: u64, _repo: Option<&str>, _timeout: std::time::Duration) -> coordinator::error::CoordResult<bool> {
        Ok(false)
    }
}

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone()));
    match config.log_format.as_str() {
        "json" => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    let _ = rustls::crypto::ring::default_provider().install_default();

    let adapter: Arc<dyn TerminalAdapter> = Arc::new(TmuxAdapter::new());

    let forum: Arc<dyn ForumNotifier> = match &config.forum_base_url {
        Some(base_url) => Arc::new(HttpForumNotifier::new(base_url.clone(), config.forum_auth_token.clone())),
        None => Arc::new(RecordingForumNotifier::default()),
    };

    let pr_review_client: Arc<dyn PrReviewClient> = match &config.github_token {
        Some(token) => Arc::new(GitHubPrReviewClient::new(token.clone(), config.github_bot_login.clone())),
        None => Arc::new(NoopPrReviewClient),
    };

    let coordinator = Arc::new(Coordinator::new(&config, adapter.clone(), forum));

    // Startup Reconciler step (a)+(b): must complete before the port binds,
    // so a crash-looping instance never issues a forum side effect before
    // confirming it can actually serve traffic (spec P9/S6).
    let orphans = load_and_prune(&coordinator, adapter.as_ref()).await;

    let addr = format!("{}:{}", config.host, config.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = addr.as_str(), error = %e, "failed to bind coordinator port");
            std::process::exit(2);
        }
    };
    info!(addr = addr.as_str(), "coordinator listening");

    // Startup Reconciler step (d): forum side effects are safe now that the
    // port is bound and accepting connections.
    coordinator::startup::finish_after_bind(&coordinator, orphans).await;

    let watch_interval = config.watch_poll_interval();
    tokio::spawn(coordinator::pane_watch::run_pane_watch(coordinator.clone(), watch_interval));

    let app = router(AppState { coordinator, pr_review_client });
    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "coordinator server exited");
        std::process::exit(1);
    }
}
