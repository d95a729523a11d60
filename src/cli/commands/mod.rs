//! CLI command implementations.

pub mod issue;
pub mod repo;
pub mod sync;

use clap::Args;

use crate::domain::models::StateFilter;

/// Repository coordinates shared by the sync commands.
#[derive(Args, Debug, Clone)]
pub struct RepoRef {
    /// Repository owner (user or organization login)
    pub owner: String,
    /// Repository name
    pub name: String,
}

pub(crate) fn parse_state_filter(value: &str) -> Result<StateFilter, String> {
    StateFilter::from_str(value).ok_or_else(|| format!("invalid state {value:?}, expected open, closed or all"))
}
