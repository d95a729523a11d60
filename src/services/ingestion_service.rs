//! Ingestion service: pulls issues from the remote tracker into storage.
//!
//! A full sync walks the remote listing page by page. Each page is
//! normalized, its users, labels and milestones are upserted, and then the
//! issues are written in a single transactional batch. Pages commit
//! independently: a failure on page N leaves pages 1..N-1 stored and aborts
//! the run without retrying.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    IssueDetails, IssueListQuery, Label, Milestone, RemoteIssue, Repository, StateFilter, User,
};
use crate::domain::ports::{IssueFilter, IssueSource, RepositoryFilter, Storage};

use super::normalizer::{normalize_issue, normalize_label, normalize_milestone, normalize_repository, normalize_user};

/// Largest page the remote API will serve.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("failed to sync repository metadata for {owner}/{name}: {source}")]
    RepositoryMetadata {
        owner: String,
        name: String,
        #[source]
        source: DomainError,
    },

    #[error("failed to fetch issues (page {page}): {source}")]
    FetchPage {
        page: u32,
        #[source]
        source: DomainError,
    },

    #[error("failed to store issues (page {page}): {source}")]
    PersistPage {
        page: u32,
        #[source]
        source: DomainError,
    },

    #[error("failed to fetch issue #{number}: {source}")]
    FetchIssue {
        number: i32,
        #[source]
        source: DomainError,
    },

    #[error("failed to store issue #{number}: {source}")]
    PersistIssue {
        number: i32,
        #[source]
        source: DomainError,
    },

    #[error("sync cancelled (page {page})")]
    Cancelled { page: u32 },
}

impl IngestionError {
    /// The underlying domain error, if any.
    pub fn domain_error(&self) -> Option<&DomainError> {
        match self {
            Self::RepositoryMetadata { source, .. }
            | Self::FetchPage { source, .. }
            | Self::PersistPage { source, .. }
            | Self::FetchIssue { source, .. }
            | Self::PersistIssue { source, .. } => Some(source),
            Self::Cancelled { .. } => None,
        }
    }
}

/// Distinct entities written for one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistStats {
    pub issues: usize,
    pub users: usize,
    pub labels: usize,
    pub milestones: usize,
}

/// Outcome of a sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Non-empty pages stored.
    pub pages: u32,
    /// Page requests made, including the final empty one.
    pub fetches: u32,
    pub issues: usize,
    /// Distinct users written during the run.
    pub users: usize,
    /// Distinct labels written during the run.
    pub labels: usize,
    /// Distinct milestones written during the run.
    pub milestones: usize,
}

impl SyncSummary {
    fn record_page(&mut self, stats: PersistStats, seen: &SeenEntities) {
        self.pages += 1;
        self.issues += stats.issues;
        self.users = seen.users.len();
        self.labels = seen.labels.len();
        self.milestones = seen.milestones.len();
    }
}

/// Ids of the supporting entities stored so far in one run.
#[derive(Debug, Default)]
struct SeenEntities {
    users: BTreeSet<i64>,
    labels: BTreeSet<i64>,
    milestones: BTreeSet<i64>,
}

impl SeenEntities {
    fn observe(&mut self, raw: &[RemoteIssue]) {
        for remote in raw {
            self.users
                .extend(remote.user.iter().chain(remote.assignees.iter()).map(|u| u.id));
            self.labels.extend(remote.labels.iter().map(|l| l.id));
            self.milestones.extend(remote.milestone.iter().map(|m| m.id));
        }
    }
}

pub struct IngestionService<S: Storage, R: IssueSource> {
    storage: Arc<S>,
    source: Arc<R>,
    page_size: u32,
}

impl<S: Storage, R: IssueSource> IngestionService<S, R> {
    pub fn new(storage: Arc<S>, source: Arc<R>) -> Self {
        Self {
            storage,
            source,
            page_size: MAX_PAGE_SIZE,
        }
    }

    /// Override the page size, clamped to `1..=MAX_PAGE_SIZE`.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Fetch repository metadata and upsert it.
    #[instrument(skip(self, name), fields(repo = name))]
    pub async fn sync_repository_metadata(&self, owner: &str, name: &str) -> Result<Repository, IngestionError> {
        let to_error = |source| IngestionError::RepositoryMetadata {
            owner: owner.to_string(),
            name: name.to_string(),
            source,
        };

        let remote = self.source.fetch_repository(owner, name).await.map_err(to_error)?;
        let repository = normalize_repository(&remote);
        self.storage.upsert_repository(&repository).await.map_err(to_error)?;

        tracing::info!(repository = %repository.full_name, id = repository.id, "synced repository metadata");
        Ok(repository)
    }

    /// Mirror every issue matching `state`, following the remote cursor until
    /// an empty page or the last page.
    #[instrument(skip(self, name, state, cancel), fields(repo = name, state = state.as_str()))]
    pub async fn fetch_and_store_all_issues(
        &self,
        owner: &str,
        name: &str,
        state: StateFilter,
        cancel: &CancellationToken,
    ) -> Result<SyncSummary, IngestionError> {
        let mut query = IssueListQuery::first_page(state, self.page_size);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(IngestionError::Cancelled { page: query.page }),
            result = self.sync_repository_metadata(owner, name) => result?,
        };

        let mut summary = SyncSummary::default();
        let mut seen = SeenEntities::default();
        loop {
            let page = query.page;
            if cancel.is_cancelled() {
                return Err(IngestionError::Cancelled { page });
            }

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(IngestionError::Cancelled { page }),
                result = self.source.list_issues(owner, name, &query) => result,
            }
            .map_err(|source| IngestionError::FetchPage { page, source })?;
            summary.fetches += 1;

            if fetched.issues.is_empty() {
                tracing::debug!(page, "empty page, sync complete");
                break;
            }

            // Dropping the write future on cancellation rolls its transaction back.
            let stats = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(IngestionError::Cancelled { page }),
                result = self.persist_issues(&fetched.issues) => result,
            }
            .map_err(|source| IngestionError::PersistPage { page, source })?;
            seen.observe(&fetched.issues);
            summary.record_page(stats, &seen);

            tracing::info!(page, issues = stats.issues, total = summary.issues, "stored issue page");

            match fetched.next_page {
                Some(next) if next > page => query.page = next,
                Some(next) => {
                    tracing::warn!(page, next, "remote cursor did not advance, stopping");
                    break;
                }
                None => break,
            }
        }

        tracing::info!(
            pages = summary.pages,
            fetches = summary.fetches,
            issues = summary.issues,
            "issue sync finished"
        );
        Ok(summary)
    }

    /// Sync repository metadata and store exactly one page of issues.
    #[instrument(skip(self, name, query), fields(repo = name, page = query.page))]
    pub async fn fetch_and_store_issues(
        &self,
        owner: &str,
        name: &str,
        query: IssueListQuery,
    ) -> Result<SyncSummary, IngestionError> {
        self.sync_repository_metadata(owner, name).await?;

        let page = query.page;
        let fetched = self
            .source
            .list_issues(owner, name, &query)
            .await
            .map_err(|source| IngestionError::FetchPage { page, source })?;

        let mut summary = SyncSummary {
            fetches: 1,
            ..Default::default()
        };
        if !fetched.issues.is_empty() {
            let stats = self
                .persist_issues(&fetched.issues)
                .await
                .map_err(|source| IngestionError::PersistPage { page, source })?;
            let mut seen = SeenEntities::default();
            seen.observe(&fetched.issues);
            summary.record_page(stats, &seen);
        }
        Ok(summary)
    }

    /// Normalize one page and write it.
    ///
    /// Users, labels and milestones are upserted first, each distinct id once
    /// with the last occurrence on the page winning. The issues then go in
    /// one batch, which either stores all of them or none.
    pub async fn persist_issues(&self, raw: &[RemoteIssue]) -> DomainResult<PersistStats> {
        let issues = raw.iter().map(normalize_issue).collect::<DomainResult<Vec<_>>>()?;

        let mut users: BTreeMap<i64, User> = BTreeMap::new();
        let mut labels: BTreeMap<i64, Label> = BTreeMap::new();
        let mut milestones: BTreeMap<i64, Milestone> = BTreeMap::new();
        for remote in raw {
            for user in remote.user.iter().chain(remote.assignees.iter()) {
                users.insert(user.id, normalize_user(user));
            }
            for label in &remote.labels {
                labels.insert(label.id, normalize_label(label));
            }
            if let Some(milestone) = &remote.milestone {
                milestones.insert(milestone.id, normalize_milestone(milestone)?);
            }
        }

        for user in users.values() {
            self.storage.upsert_user(user).await?;
        }
        for label in labels.values() {
            self.storage.upsert_label(label).await?;
        }
        for milestone in milestones.values() {
            self.storage.upsert_milestone(milestone).await?;
        }
        self.storage.batch_upsert_issues(&issues).await?;

        Ok(PersistStats {
            issues: issues.len(),
            users: users.len(),
            labels: labels.len(),
            milestones: milestones.len(),
        })
    }

    /// Fetch a single issue and store it with its associations.
    #[instrument(skip(self, name), fields(repo = name))]
    pub async fn sync_issue(&self, owner: &str, name: &str, number: i32) -> Result<IssueDetails, IngestionError> {
        let remote = self
            .source
            .get_issue(owner, name, number)
            .await
            .map_err(|source| IngestionError::FetchIssue { number, source })?;

        let to_error = |source| IngestionError::PersistIssue { number, source };
        self.persist_issues(std::slice::from_ref(&remote)).await.map_err(to_error)?;
        let stored = self.storage.get_issue(remote.id).await.map_err(to_error)?;

        tracing::info!(number, id = remote.id, "synced issue");
        Ok(stored)
    }

    /// Refresh one stored issue from the remote.
    pub async fn update_issue_from_remote(
        &self,
        owner: &str,
        name: &str,
        number: i32,
    ) -> Result<IssueDetails, IngestionError> {
        self.sync_issue(owner, name, number).await
    }

    pub async fn get_issue_by_number(&self, number: i32) -> DomainResult<IssueDetails> {
        self.storage.get_issue_by_number(number).await
    }

    pub async fn get_issue_by_id(&self, id: i64) -> DomainResult<IssueDetails> {
        self.storage.get_issue(id).await
    }

    pub async fn list_issues(&self, filter: IssueFilter) -> DomainResult<Vec<IssueDetails>> {
        self.storage.list_issues(filter).await
    }

    pub async fn get_repository_by_id(&self, id: i64) -> DomainResult<Repository> {
        self.storage.get_repository(id).await
    }

    pub async fn get_repository_by_full_name(&self, full_name: &str) -> DomainResult<Repository> {
        self.storage.get_repository_by_full_name(full_name).await
    }

    pub async fn list_repositories(&self, filter: RepositoryFilter) -> DomainResult<Vec<Repository>> {
        self.storage.list_repositories(filter).await
    }
}
