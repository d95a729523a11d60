//! Repository domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Branch assumed when the remote does not report one.
pub const DEFAULT_BRANCH: &str = "main";

/// Metadata of a mirrored repository. Not referenced by issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub name: String,
    /// `owner/name`, unique.
    pub full_name: String,
    pub owner_login: String,
    pub description: String,
    pub private: bool,
    pub archived: bool,
    pub disabled: bool,
    pub html_url: String,
    pub default_branch: String,
    pub language: String,
    pub stargazers_count: i32,
    pub forks_count: i32,
    pub open_issues_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pushed_at: Option<DateTime<Utc>>,
}

impl Repository {
    pub fn new(id: i64, owner_login: impl Into<String>, name: impl Into<String>) -> Self {
        let owner_login = owner_login.into();
        let name = name.into();
        let now = Utc::now();
        Self {
            id,
            full_name: derive_full_name(&owner_login, &name),
            name,
            owner_login,
            description: String::new(),
            private: false,
            archived: false,
            disabled: false,
            html_url: String::new(),
            default_branch: DEFAULT_BRANCH.to_string(),
            language: String::new(),
            stargazers_count: 0,
            forks_count: 0,
            open_issues_count: 0,
            created_at: now,
            updated_at: now,
            pushed_at: None,
        }
    }
}

/// Build `owner/name`.
pub fn derive_full_name(owner_login: &str, name: &str) -> String {
    format!("{owner_login}/{name}")
}
