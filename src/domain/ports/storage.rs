//! Storage port.
//!
//! Every backing store implements the five per-entity traits plus
//! [`Storage::close`]. The ingestion service programs against [`Storage`]
//! only, so engines can be swapped without touching it.
//!
//! Contract shared by all entity kinds:
//! - `create_*` fails with `AlreadyExists` on a primary-key collision.
//! - `get_*` fails with `NotFound` when the key is absent.
//! - `upsert_*` creates or fully replaces in place and never fails on existence.
//! - `delete_*` fails with `NotFound` when absent and never leaves dangling
//!   references behind.
//! - `list_*` is offset-paginated; a zero limit means "no limit".

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    Issue, IssueDetails, Label, Milestone, Repository, StateFilter, User,
};

/// Offset pagination shared by all list operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub offset: u32,
    /// Zero disables the limit.
    pub limit: u32,
}

impl ListOptions {
    pub const fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }

    /// `LIMIT` value for SQL engines, where `-1` means unbounded.
    pub fn sql_limit(&self) -> i64 {
        if self.limit == 0 {
            -1
        } else {
            i64::from(self.limit)
        }
    }

    /// Apply the window to an already ordered sequence.
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset as usize);
        if self.limit == 0 {
            iter.collect()
        } else {
            iter.take(self.limit as usize).collect()
        }
    }
}

/// Filter criteria for listing issues.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub page: ListOptions,
    pub state: StateFilter,
    /// Only issues linked to a label with exactly this name.
    pub label: Option<String>,
}

impl IssueFilter {
    pub fn all() -> Self {
        Self {
            state: StateFilter::All,
            ..Default::default()
        }
    }
}

/// Filter criteria for listing repositories.
#[derive(Debug, Clone, Default)]
pub struct RepositoryFilter {
    pub page: ListOptions,
    pub owner_login: Option<String>,
    /// Archived repositories are skipped unless set.
    pub include_archived: bool,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: &User) -> DomainResult<()>;

    async fn get_user(&self, id: i64) -> DomainResult<User>;

    async fn upsert_user(&self, user: &User) -> DomainResult<()>;

    async fn delete_user(&self, id: i64) -> DomainResult<()>;

    async fn list_users(&self, options: ListOptions) -> DomainResult<Vec<User>>;
}

#[async_trait]
pub trait LabelStore: Send + Sync {
    async fn create_label(&self, label: &Label) -> DomainResult<()>;

    async fn get_label(&self, id: i64) -> DomainResult<Label>;

    async fn upsert_label(&self, label: &Label) -> DomainResult<()>;

    async fn delete_label(&self, id: i64) -> DomainResult<()>;

    async fn list_labels(&self, options: ListOptions) -> DomainResult<Vec<Label>>;
}

#[async_trait]
pub trait MilestoneStore: Send + Sync {
    async fn create_milestone(&self, milestone: &Milestone) -> DomainResult<()>;

    async fn get_milestone(&self, id: i64) -> DomainResult<Milestone>;

    async fn upsert_milestone(&self, milestone: &Milestone) -> DomainResult<()>;

    async fn delete_milestone(&self, id: i64) -> DomainResult<()>;

    async fn list_milestones(&self, options: ListOptions) -> DomainResult<Vec<Milestone>>;
}

#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Insert a new issue with its associations in one transaction.
    async fn create_issue(&self, issue: &Issue) -> DomainResult<()>;

    async fn get_issue(&self, id: i64) -> DomainResult<IssueDetails>;

    async fn get_issue_by_number(&self, number: i32) -> DomainResult<IssueDetails>;

    async fn upsert_issue(&self, issue: &Issue) -> DomainResult<()>;

    async fn delete_issue(&self, id: i64) -> DomainResult<()>;

    async fn list_issues(&self, filter: IssueFilter) -> DomainResult<Vec<IssueDetails>>;

    /// Upsert every issue and its links atomically: all or none are stored.
    ///
    /// A milestone or creator reference to a row that does not exist is
    /// dropped rather than failing the batch. Label and assignee links are
    /// only ever added, never removed.
    async fn batch_upsert_issues(&self, issues: &[Issue]) -> DomainResult<()>;
}

#[async_trait]
pub trait RepositoryStore: Send + Sync {
    async fn create_repository(&self, repository: &Repository) -> DomainResult<()>;

    async fn get_repository(&self, id: i64) -> DomainResult<Repository>;

    async fn get_repository_by_full_name(&self, full_name: &str) -> DomainResult<Repository>;

    async fn upsert_repository(&self, repository: &Repository) -> DomainResult<()>;

    async fn delete_repository(&self, id: i64) -> DomainResult<()>;

    async fn list_repositories(&self, filter: RepositoryFilter) -> DomainResult<Vec<Repository>>;
}

/// The full storage capability set.
#[async_trait]
pub trait Storage: IssueStore + UserStore + LabelStore + MilestoneStore + RepositoryStore {
    /// Release underlying connections. Calling it more than once is a no-op.
    async fn close(&self) -> DomainResult<()>;
}
