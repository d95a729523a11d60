//! Sync commands: pull data from GitHub into the local store.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::adapters::github::GitHubClient;
use crate::adapters::sqlite::SqliteStorage;
use crate::cli::open_storage;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, StateFilter};
use crate::domain::ports::Storage;
use crate::services::{IngestionService, SyncSummary};

use super::issue::IssueDetailOutput;
use super::repo::RepoDetailOutput;
use super::{parse_state_filter, RepoRef};

#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub repo: RepoRef,

    /// Issue state to mirror (open, closed, all)
    #[arg(short, long, default_value = "all", value_parser = parse_state_filter)]
    pub state: StateFilter,
}

#[derive(Args, Debug)]
pub struct SyncIssueArgs {
    #[command(flatten)]
    pub repo: RepoRef,

    /// Issue number
    pub number: i32,
}

#[derive(Args, Debug)]
pub struct SyncRepoArgs {
    #[command(flatten)]
    pub repo: RepoRef,
}

#[derive(Debug, serde::Serialize)]
pub struct SyncOutput {
    pub repository: String,
    pub state: String,
    #[serde(flatten)]
    pub summary: SyncSummary,
}

impl CommandOutput for SyncOutput {
    fn to_human(&self) -> String {
        let s = &self.summary;
        format!(
            "Synced {} {} issue(s) from {} across {} page(s) ({} request(s))\n  users: {}  labels: {}  milestones: {}",
            s.issues, self.state, self.repository, s.pages, s.fetches, s.users, s.labels, s.milestones
        )
    }
}

type Service = IngestionService<SqliteStorage, GitHubClient>;

async fn build_service(config: &Config) -> Result<Service> {
    let storage = Arc::new(open_storage(config).await?);
    let client = GitHubClient::from_config(&config.github);
    if !client.is_authenticated() {
        tracing::warn!("no GitHub token configured, requests are unauthenticated");
    }
    Ok(IngestionService::new(storage, Arc::new(client)).with_page_size(config.github.per_page))
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling sync");
            token.cancel();
        }
    });
}

pub async fn execute_sync(args: SyncArgs, config: &Config, json_mode: bool) -> Result<()> {
    let service = build_service(config).await?;
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let RepoRef { owner, name } = &args.repo;
    let result = service
        .fetch_and_store_all_issues(owner, name, args.state, &cancel)
        .await
        .with_context(|| format!("Failed to sync issues for {owner}/{name}"));
    service.storage().close().await?;

    let summary = result?;
    output(
        &SyncOutput {
            repository: format!("{owner}/{name}"),
            state: args.state.as_str().to_string(),
            summary,
        },
        json_mode,
    );
    Ok(())
}

pub async fn execute_sync_issue(args: SyncIssueArgs, config: &Config, json_mode: bool) -> Result<()> {
    let service = build_service(config).await?;

    let RepoRef { owner, name } = &args.repo;
    let result = service
        .sync_issue(owner, name, args.number)
        .await
        .with_context(|| format!("Failed to sync issue {owner}/{name}#{}", args.number));
    service.storage().close().await?;

    output(&IssueDetailOutput::from(&result?), json_mode);
    Ok(())
}

pub async fn execute_sync_repo(args: SyncRepoArgs, config: &Config, json_mode: bool) -> Result<()> {
    let service = build_service(config).await?;

    let RepoRef { owner, name } = &args.repo;
    let result = service
        .sync_repository_metadata(owner, name)
        .await
        .with_context(|| format!("Failed to sync repository {owner}/{name}"));
    service.storage().close().await?;

    output(&RepoDetailOutput { repository: result? }, json_mode);
    Ok(())
}
