//! Repository query commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::Cell;

use crate::cli::open_storage;
use crate::cli::output::{output, table_with_header, truncate, CommandOutput};
use crate::domain::models::{Config, Repository};
use crate::domain::ports::{ListOptions, RepositoryFilter, RepositoryStore, Storage};

#[derive(Args, Debug)]
pub struct RepoArgs {
    #[command(subcommand)]
    pub command: RepoCommands,
}

#[derive(Subcommand, Debug)]
pub enum RepoCommands {
    /// List stored repositories
    List {
        /// Only repositories owned by this login
        #[arg(short, long)]
        owner: Option<String>,
        /// Include archived repositories
        #[arg(long)]
        include_archived: bool,
        /// Maximum number of repositories to display (0 for no limit)
        #[arg(short = 'n', long, default_value = "50")]
        limit: u32,
        /// Number of repositories to skip
        #[arg(long, default_value = "0")]
        offset: u32,
    },
    /// Show one stored repository by full name (owner/name)
    Show {
        full_name: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct RepoListOutput {
    pub repositories: Vec<Repository>,
    pub total: usize,
}

impl CommandOutput for RepoListOutput {
    fn to_human(&self) -> String {
        if self.repositories.is_empty() {
            return "No repositories found.".to_string();
        }

        let mut table = table_with_header(&["Full name", "Language", "Stars", "Open issues", "Flags"]);
        for repo in &self.repositories {
            table.add_row(vec![
                Cell::new(&repo.full_name),
                Cell::new(if repo.language.is_empty() { "-" } else { repo.language.as_str() }),
                Cell::new(repo.stargazers_count),
                Cell::new(repo.open_issues_count),
                Cell::new(flags(repo)),
            ]);
        }

        format!("Found {} repository(ies):\n{table}", self.total)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RepoDetailOutput {
    pub repository: Repository,
}

impl CommandOutput for RepoDetailOutput {
    fn to_human(&self) -> String {
        let repo = &self.repository;
        let mut lines = vec![
            format!("Repository: {}", repo.full_name),
            format!("ID: {}", repo.id),
            format!("Owner: {}", repo.owner_login),
            format!("Default branch: {}", repo.default_branch),
            format!("Stars: {}  Forks: {}  Open issues: {}", repo.stargazers_count, repo.forks_count, repo.open_issues_count),
            format!("Created: {}", repo.created_at.to_rfc3339()),
            format!("Updated: {}", repo.updated_at.to_rfc3339()),
        ];

        if let Some(pushed_at) = repo.pushed_at {
            lines.push(format!("Pushed: {}", pushed_at.to_rfc3339()));
        }
        if !repo.language.is_empty() {
            lines.push(format!("Language: {}", repo.language));
        }
        let flags = flags(repo);
        if !flags.is_empty() {
            lines.push(format!("Flags: {flags}"));
        }
        if !repo.description.is_empty() {
            lines.push(format!("Description: {}", truncate(&repo.description, 200)));
        }
        if !repo.html_url.is_empty() {
            lines.push(format!("URL: {}", repo.html_url));
        }

        lines.join("\n")
    }
}

fn flags(repo: &Repository) -> String {
    [
        (repo.private, "private"),
        (repo.archived, "archived"),
        (repo.disabled, "disabled"),
    ]
    .iter()
    .filter(|(set, _)| *set)
    .map(|(_, name)| *name)
    .collect::<Vec<_>>()
    .join(", ")
}

pub async fn execute(args: RepoArgs, config: &Config, json_mode: bool) -> Result<()> {
    let storage = open_storage(config).await?;

    let result = match args.command {
        RepoCommands::List { owner, include_archived, limit, offset } => {
            let filter = RepositoryFilter {
                page: ListOptions::new(offset, limit),
                owner_login: owner,
                include_archived,
            };
            let repositories = storage
                .list_repositories(filter)
                .await
                .context("Failed to list repositories")?;
            let total = repositories.len();
            output(&RepoListOutput { repositories, total }, json_mode);
            Ok(())
        }
        RepoCommands::Show { full_name } => {
            let repository = storage
                .get_repository_by_full_name(&full_name)
                .await
                .with_context(|| format!("Failed to load repository {full_name}"))?;
            output(&RepoDetailOutput { repository }, json_mode);
            Ok(())
        }
    };

    storage.close().await?;
    result
}
