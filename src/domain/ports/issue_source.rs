//! Remote issue source port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{IssueListQuery, IssuePage, RemoteIssue, RemoteRepository};

/// Read-only access to a remote issue tracker.
#[async_trait]
pub trait IssueSource: Send + Sync {
    async fn fetch_repository(&self, owner: &str, name: &str) -> DomainResult<RemoteRepository>;

    /// Fetch one page of issues. An empty page or `next_page == None`
    /// signals the end of the listing.
    async fn list_issues(
        &self,
        owner: &str,
        name: &str,
        query: &IssueListQuery,
    ) -> DomainResult<IssuePage>;

    async fn get_issue(&self, owner: &str, name: &str, number: i32) -> DomainResult<RemoteIssue>;
}
