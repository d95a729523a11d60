//! Raw records returned by the remote issue tracker.
//!
//! These structs map to the GitHub REST API v3 JSON payloads. They are
//! denormalized (users, labels and milestones are embedded inline) and are
//! flattened into the entity model by the normalizer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StateFilter;

/// An issue as returned by the remote API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteIssue {
    pub id: i64,
    pub number: i32,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    /// `"open"` or `"closed"`.
    pub state: String,
    #[serde(default)]
    pub comments: i32,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// The creator.
    #[serde(default)]
    pub user: Option<RemoteUser>,
    #[serde(default)]
    pub labels: Vec<RemoteLabel>,
    #[serde(default)]
    pub assignees: Vec<RemoteUser>,
    #[serde(default)]
    pub milestone: Option<RemoteMilestone>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLabel {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteMilestone {
    pub id: i64,
    pub number: i32,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: String,
    #[serde(default)]
    pub due_on: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository metadata as returned by the remote API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub owner: Option<RemoteOwner>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: i32,
    #[serde(default)]
    pub forks_count: i32,
    #[serde(default)]
    pub open_issues_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
}

/// The embedded owner of a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteOwner {
    pub login: String,
}

/// Parameters for one page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueListQuery {
    pub state: StateFilter,
    /// 1-based page cursor.
    pub page: u32,
    pub per_page: u32,
}

impl IssueListQuery {
    pub fn first_page(state: StateFilter, per_page: u32) -> Self {
        Self {
            state,
            page: 1,
            per_page,
        }
    }
}

/// One page of issues plus the cursor for the following page.
#[derive(Debug, Clone, Default)]
pub struct IssuePage {
    pub issues: Vec<RemoteIssue>,
    /// `None` when the remote reports no further pages.
    pub next_page: Option<u32>,
}
