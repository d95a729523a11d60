//! issue-mirror CLI entry point.

use clap::Parser;

use issue_mirror::cli::commands::{issue, repo, sync};
use issue_mirror::cli::{handle_error, load_config, Cli, Commands};
use issue_mirror::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    // Keeps the file writer alive until exit.
    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Sync(args) => sync::execute_sync(args, &config, cli.json).await,
        Commands::SyncIssue(args) => sync::execute_sync_issue(args, &config, cli.json).await,
        Commands::SyncRepo(args) => sync::execute_sync_repo(args, &config, cli.json).await,
        Commands::Issue(args) => issue::execute(args, &config, cli.json).await,
        Commands::Repo(args) => repo::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
