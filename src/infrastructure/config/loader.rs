use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Environment variable consulted when no token is configured.
pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid per_page: {0}. Must be between 1 and 100")]
    InvalidPerPage(u32),

    #[error("Invalid requests_per_hour: {0}. Must be positive")]
    InvalidRequestRate(u32),

    #[error("GitHub API base URL cannot be empty")]
    EmptyApiBaseUrl,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .issue-mirror/config.yaml (project config)
    /// 3. .issue-mirror/local.yaml (project local overrides, optional)
    /// 4. Environment variables (ISSUE_MIRROR_* prefix, `__` separates sections)
    ///
    /// `GITHUB_TOKEN` fills in the token when none of the above set one.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".issue-mirror/config.yaml"))
            .merge(Yaml::file(".issue-mirror/local.yaml"))
            .merge(Env::prefixed("ISSUE_MIRROR_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        let config = Self::apply_token_fallback(config);
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring environment overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("ISSUE_MIRROR_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        let config = Self::apply_token_fallback(config);
        Self::validate(&config)?;
        Ok(config)
    }

    fn apply_token_fallback(mut config: Config) -> Config {
        let configured = config.github.token.as_deref().is_some_and(|t| !t.is_empty());
        if !configured {
            config.github.token = std::env::var(GITHUB_TOKEN_VAR).ok().filter(|t| !t.is_empty());
        }
        config
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        if !(1..=100).contains(&config.github.per_page) {
            return Err(ConfigError::InvalidPerPage(config.github.per_page));
        }

        if config.github.requests_per_hour == 0 {
            return Err(ConfigError::InvalidRequestRate(config.github.requests_per_hour));
        }

        if config.github.api_base_url.trim().is_empty() {
            return Err(ConfigError::EmptyApiBaseUrl);
        }

        Ok(())
    }
}
