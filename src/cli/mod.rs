//! Command-line interface.

pub mod commands;
pub mod output;
pub mod types;

use std::path::Path;

use anyhow::{Context, Result};

use crate::adapters::sqlite::{initialize_database, PoolConfig, SqliteStorage};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

pub use types::{Cli, Commands};

/// Load configuration from `path` when given, otherwise from the default hierarchy.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Open the configured database, applying pending migrations.
pub async fn open_storage(config: &Config) -> Result<SqliteStorage> {
    let pool = initialize_database(&config.database.url(), Some(PoolConfig::from(&config.database)))
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path))?;
    Ok(SqliteStorage::new(pool))
}

/// Report a command failure and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": chain,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
