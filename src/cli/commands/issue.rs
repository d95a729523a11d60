//! Issue query commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::Cell;

use crate::cli::open_storage;
use crate::cli::output::{output, state_cell, table_with_header, truncate, CommandOutput};
use crate::domain::models::{Config, IssueDetails, StateFilter};
use crate::domain::ports::{IssueFilter, IssueStore, ListOptions, Storage};

use super::parse_state_filter;

#[derive(Args, Debug)]
pub struct IssueArgs {
    #[command(subcommand)]
    pub command: IssueCommands,
}

#[derive(Subcommand, Debug)]
pub enum IssueCommands {
    /// List stored issues, newest first
    List {
        /// Filter by state (open, closed, all)
        #[arg(short, long, default_value = "all", value_parser = parse_state_filter)]
        state: StateFilter,
        /// Only issues carrying this label name
        #[arg(short, long)]
        label: Option<String>,
        /// Maximum number of issues to display (0 for no limit)
        #[arg(short = 'n', long, default_value = "50")]
        limit: u32,
        /// Number of issues to skip
        #[arg(long, default_value = "0")]
        offset: u32,
    },
    /// Show one stored issue by number
    Show {
        /// Issue number
        number: i32,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct IssueOutput {
    pub id: i64,
    pub number: i32,
    pub title: String,
    pub state: String,
    pub creator: Option<String>,
    pub milestone: Option<String>,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub comments: i32,
    pub locked: bool,
    pub html_url: String,
    pub created_at: String,
    pub updated_at: String,
    pub closed_at: Option<String>,
}

impl From<&IssueDetails> for IssueOutput {
    fn from(details: &IssueDetails) -> Self {
        let issue = &details.issue;
        Self {
            id: issue.id,
            number: issue.number,
            title: issue.title.clone(),
            state: issue.state.as_str().to_string(),
            creator: details.creator.as_ref().map(|u| u.login.clone()),
            milestone: details.milestone.as_ref().map(|m| m.title.clone()),
            labels: details.labels.iter().map(|l| l.name.clone()).collect(),
            assignees: details.assignees.iter().map(|u| u.login.clone()).collect(),
            comments: issue.comments,
            locked: issue.locked,
            html_url: issue.html_url.clone(),
            created_at: issue.created_at.to_rfc3339(),
            updated_at: issue.updated_at.to_rfc3339(),
            closed_at: issue.closed_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct IssueListOutput {
    pub issues: Vec<IssueOutput>,
    pub total: usize,
    #[serde(skip)]
    states: Vec<crate::domain::models::ItemState>,
}

impl IssueListOutput {
    pub fn new(details: &[IssueDetails]) -> Self {
        Self {
            issues: details.iter().map(IssueOutput::from).collect(),
            total: details.len(),
            states: details.iter().map(|d| d.issue.state).collect(),
        }
    }
}

impl CommandOutput for IssueListOutput {
    fn to_human(&self) -> String {
        if self.issues.is_empty() {
            return "No issues found.".to_string();
        }

        let mut table = table_with_header(&["#", "Title", "State", "Labels", "Creator", "Updated"]);
        for (issue, state) in self.issues.iter().zip(&self.states) {
            table.add_row(vec![
                Cell::new(issue.number),
                Cell::new(truncate(&issue.title, 48)),
                state_cell(*state),
                Cell::new(truncate(&issue.labels.join(", "), 24)),
                Cell::new(issue.creator.as_deref().unwrap_or("-")),
                Cell::new(issue.updated_at.get(..10).unwrap_or(&issue.updated_at)),
            ]);
        }

        format!("Found {} issue(s):\n{table}", self.total)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct IssueDetailOutput {
    pub issue: IssueOutput,
    pub body: String,
}

impl From<&IssueDetails> for IssueDetailOutput {
    fn from(details: &IssueDetails) -> Self {
        Self {
            issue: IssueOutput::from(details),
            body: details.issue.body.clone(),
        }
    }
}

impl CommandOutput for IssueDetailOutput {
    fn to_human(&self) -> String {
        let issue = &self.issue;
        let mut lines = vec![
            format!("#{} {}", issue.number, issue.title),
            format!("ID: {}", issue.id),
            format!("State: {}", issue.state),
            format!("Creator: {}", issue.creator.as_deref().unwrap_or("-")),
            format!("Milestone: {}", issue.milestone.as_deref().unwrap_or("-")),
            format!("Comments: {}", issue.comments),
            format!("Created: {}", issue.created_at),
            format!("Updated: {}", issue.updated_at),
        ];

        if let Some(closed_at) = &issue.closed_at {
            lines.push(format!("Closed: {closed_at}"));
        }
        if issue.locked {
            lines.push("Locked: yes".to_string());
        }
        if !issue.labels.is_empty() {
            lines.push(format!("Labels: {}", issue.labels.join(", ")));
        }
        if !issue.assignees.is_empty() {
            lines.push(format!("Assignees: {}", issue.assignees.join(", ")));
        }
        if !issue.html_url.is_empty() {
            lines.push(format!("URL: {}", issue.html_url));
        }
        if !self.body.is_empty() {
            lines.push(String::new());
            lines.push(self.body.clone());
        }

        lines.join("\n")
    }
}

pub async fn execute(args: IssueArgs, config: &Config, json_mode: bool) -> Result<()> {
    let storage = open_storage(config).await?;

    let result = match args.command {
        IssueCommands::List { state, label, limit, offset } => {
            let filter = IssueFilter {
                page: ListOptions::new(offset, limit),
                state,
                label,
            };
            let issues = storage.list_issues(filter).await.context("Failed to list issues")?;
            output(&IssueListOutput::new(&issues), json_mode);
            Ok(())
        }
        IssueCommands::Show { number } => {
            let details = storage
                .get_issue_by_number(number)
                .await
                .with_context(|| format!("Failed to load issue #{number}"))?;
            output(&IssueDetailOutput::from(&details), json_mode);
            Ok(())
        }
    };

    storage.close().await?;
    result
}
