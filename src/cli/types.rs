//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::commands::issue::IssueArgs;
use crate::cli::commands::repo::RepoArgs;
use crate::cli::commands::sync::{SyncArgs, SyncIssueArgs, SyncRepoArgs};

#[derive(Parser, Debug)]
#[command(name = "issue-mirror")]
#[command(about = "Mirror GitHub issues into a local SQLite store", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .issue-mirror/config.yaml)
    #[arg(short, long, global = true, env = "ISSUE_MIRROR_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync repository metadata and every issue page
    Sync(SyncArgs),

    /// Sync a single issue by number
    SyncIssue(SyncIssueArgs),

    /// Sync repository metadata only
    SyncRepo(SyncRepoArgs),

    /// Query stored issues
    Issue(IssueArgs),

    /// Query stored repositories
    Repo(RepoArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::issue::IssueCommands;
    use crate::domain::models::StateFilter;

    #[test]
    fn test_parse_sync() {
        let cli = Cli::try_parse_from(["issue-mirror", "sync", "octocat", "Hello-World", "--state", "open"]).unwrap();
        match cli.command {
            Commands::Sync(args) => {
                assert_eq!(args.repo.owner, "octocat");
                assert_eq!(args.repo.name, "Hello-World");
                assert_eq!(args.state, StateFilter::Open);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_sync_defaults_to_all_states() {
        let cli = Cli::try_parse_from(["issue-mirror", "sync", "octocat", "Hello-World"]).unwrap();
        assert!(matches!(cli.command, Commands::Sync(SyncArgs { state: StateFilter::All, .. })));
    }

    #[test]
    fn test_parse_invalid_state() {
        assert!(Cli::try_parse_from(["issue-mirror", "sync", "octocat", "Hello-World", "--state", "merged"]).is_err());
    }

    #[test]
    fn test_parse_issue_list_with_global_json() {
        let cli = Cli::try_parse_from(["issue-mirror", "issue", "list", "--label", "bug", "--limit", "5", "--json"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Issue(IssueArgs { command: IssueCommands::List { label, limit, .. } }) => {
                assert_eq!(label.as_deref(), Some("bug"));
                assert_eq!(limit, 5);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_sync_issue() {
        let cli = Cli::try_parse_from(["issue-mirror", "sync-issue", "octocat", "Hello-World", "7"]).unwrap();
        assert!(matches!(cli.command, Commands::SyncIssue(SyncIssueArgs { number: 7, .. })));
    }
}
