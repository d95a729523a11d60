//! Issue domain model.
//!
//! An [`Issue`] is the normalized write shape: singular associations are held
//! as optional id references and plural associations as id lists. Reads
//! return [`IssueDetails`], which carries the resolved associated entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Label, Milestone, User};

/// Open/closed state shared by issues and milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Open,
    Closed,
}

impl Default for ItemState {
    fn default() -> Self {
        Self::Open
    }
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// State filter used when listing issues or requesting pages from the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateFilter {
    #[default]
    Open,
    Closed,
    All,
}

impl StateFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    /// The single state this filter selects, or `None` for [`StateFilter::All`].
    pub fn state(&self) -> Option<ItemState> {
        match self {
            Self::Open => Some(ItemState::Open),
            Self::Closed => Some(ItemState::Closed),
            Self::All => None,
        }
    }
}

/// A normalized issue.
///
/// `closed_at`, `creator_id` and `milestone_id` are present-or-absent: an
/// absent value written through an upsert clears whatever was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Remote issue id, used as the primary key.
    pub id: i64,
    /// Issue number, unique within the mirrored repository.
    pub number: i32,
    pub title: String,
    pub body: String,
    pub state: ItemState,
    /// Number of comments.
    pub comments: i32,
    pub locked: bool,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub creator_id: Option<i64>,
    pub milestone_id: Option<i64>,
    pub label_ids: Vec<i64>,
    pub assignee_ids: Vec<i64>,
}

impl Issue {
    /// Create an open issue with empty associations.
    pub fn new(id: i64, number: i32, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            number,
            title: title.into(),
            body: String::new(),
            state: ItemState::Open,
            comments: 0,
            locked: false,
            html_url: String::new(),
            created_at: now,
            updated_at: now,
            closed_at: None,
            creator_id: None,
            milestone_id: None,
            label_ids: Vec::new(),
            assignee_ids: Vec::new(),
        }
    }

    pub fn with_creator(mut self, user_id: i64) -> Self {
        self.creator_id = Some(user_id);
        self
    }

    pub fn with_milestone(mut self, milestone_id: i64) -> Self {
        self.milestone_id = Some(milestone_id);
        self
    }

    pub fn with_labels(mut self, label_ids: Vec<i64>) -> Self {
        self.label_ids = label_ids;
        self
    }

    pub fn with_assignees(mut self, user_ids: Vec<i64>) -> Self {
        self.assignee_ids = user_ids;
        self
    }

    /// Mark the issue closed at the given time.
    pub fn closed(mut self, at: DateTime<Utc>) -> Self {
        self.state = ItemState::Closed;
        self.closed_at = Some(at);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id <= 0 {
            return Err(format!("issue id must be positive, got {}", self.id));
        }
        if self.title.trim().is_empty() {
            return Err(format!("issue {} has an empty title", self.id));
        }
        Ok(())
    }
}

/// An issue as read back from storage, with every association resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDetails {
    /// The stored row; references reflect what was actually linked.
    pub issue: Issue,
    pub creator: Option<User>,
    pub milestone: Option<Milestone>,
    pub labels: Vec<Label>,
    pub assignees: Vec<User>,
}
