//! In-memory implementation of the Storage port.
//!
//! All entities live in ordered maps behind one `tokio::sync::RwLock`. Issue
//! batches are applied to a cloned snapshot that replaces the live state only
//! when every issue in the batch was written, so a failed batch leaves no
//! trace.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::{require_id, DomainError, DomainResult, EntityKind};
use crate::domain::models::{Issue, IssueDetails, Label, Milestone, Repository, User};
use crate::domain::ports::{
    IssueFilter, IssueStore, LabelStore, ListOptions, MilestoneStore, RepositoryFilter,
    RepositoryStore, Storage, UserStore,
};

/// An issue as held in memory: links are sets so re-linking is a no-op.
#[derive(Debug, Clone)]
struct StoredIssue {
    issue: Issue,
    label_ids: BTreeSet<i64>,
    assignee_ids: BTreeSet<i64>,
}

#[derive(Debug, Clone, Default)]
struct State {
    users: BTreeMap<i64, User>,
    labels: BTreeMap<i64, Label>,
    milestones: BTreeMap<i64, Milestone>,
    issues: BTreeMap<i64, StoredIssue>,
    repositories: BTreeMap<i64, Repository>,
}

impl State {
    /// Apply one issue write with the same reference rules as the SQL adapter.
    fn write_issue(&mut self, issue: &Issue, insert_only: bool) -> DomainResult<()> {
        if insert_only && self.issues.contains_key(&issue.id) {
            return Err(DomainError::already_exists(EntityKind::Issue, issue.id));
        }
        if self
            .issues
            .values()
            .any(|stored| stored.issue.number == issue.number && stored.issue.id != issue.id)
        {
            return Err(DomainError::already_exists(EntityKind::Issue, format!("number {}", issue.number)));
        }
        if let Some(label_id) = issue.label_ids.iter().find(|id| !self.labels.contains_key(id)) {
            return Err(missing_link("link_issue_label", issue.id, EntityKind::Label, *label_id));
        }
        if let Some(user_id) = issue.assignee_ids.iter().find(|id| !self.users.contains_key(id)) {
            return Err(missing_link("link_issue_assignee", issue.id, EntityKind::User, *user_id));
        }

        let mut row = issue.clone();
        row.creator_id = issue.creator_id.filter(|id| {
            let known = self.users.contains_key(id);
            if !known {
                tracing::debug!(issue_id = issue.id, user_id = *id, "dropping reference to missing creator");
            }
            known
        });
        row.milestone_id = issue.milestone_id.filter(|id| {
            let known = self.milestones.contains_key(id);
            if !known {
                tracing::debug!(issue_id = issue.id, milestone_id = *id, "dropping reference to missing milestone");
            }
            known
        });
        row.label_ids = Vec::new();
        row.assignee_ids = Vec::new();

        match self.issues.get_mut(&issue.id) {
            Some(stored) => {
                row.created_at = stored.issue.created_at;
                stored.issue = row;
                stored.label_ids.extend(issue.label_ids.iter().copied());
                stored.assignee_ids.extend(issue.assignee_ids.iter().copied());
            }
            None => {
                self.issues.insert(
                    issue.id,
                    StoredIssue {
                        issue: row,
                        label_ids: issue.label_ids.iter().copied().collect(),
                        assignee_ids: issue.assignee_ids.iter().copied().collect(),
                    },
                );
            }
        }
        Ok(())
    }

    fn details(&self, stored: &StoredIssue) -> IssueDetails {
        let mut issue = stored.issue.clone();
        let labels: Vec<Label> = stored.label_ids.iter().filter_map(|id| self.labels.get(id).cloned()).collect();
        let assignees: Vec<User> = stored.assignee_ids.iter().filter_map(|id| self.users.get(id).cloned()).collect();
        issue.label_ids = labels.iter().map(|l| l.id).collect();
        issue.assignee_ids = assignees.iter().map(|u| u.id).collect();

        IssueDetails {
            creator: issue.creator_id.and_then(|id| self.users.get(&id).cloned()),
            milestone: issue.milestone_id.and_then(|id| self.milestones.get(&id).cloned()),
            issue,
            labels,
            assignees,
        }
    }
}

fn missing_link(operation: &str, issue_id: i64, entity: EntityKind, id: i64) -> DomainError {
    DomainError::Database {
        operation: operation.to_string(),
        key: format!("issue {issue_id}"),
        message: format!("{entity} {id} does not exist"),
    }
}

/// Storage held entirely in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    state: RwLock<State>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryStorage {
    async fn create_user(&self, user: &User) -> DomainResult<()> {
        require_id(EntityKind::User, user.id)?;
        let mut state = self.state.write().await;
        if state.users.contains_key(&user.id) {
            return Err(DomainError::already_exists(EntityKind::User, user.id));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: i64) -> DomainResult<User> {
        let state = self.state.read().await;
        state.users.get(&id).cloned().ok_or_else(|| DomainError::not_found(EntityKind::User, id))
    }

    async fn upsert_user(&self, user: &User) -> DomainResult<()> {
        require_id(EntityKind::User, user.id)?;
        self.state.write().await.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> DomainResult<()> {
        require_id(EntityKind::User, id)?;
        let mut state = self.state.write().await;
        if state.users.remove(&id).is_none() {
            return Err(DomainError::not_found(EntityKind::User, id));
        }
        for stored in state.issues.values_mut() {
            if stored.issue.creator_id == Some(id) {
                stored.issue.creator_id = None;
            }
            stored.assignee_ids.remove(&id);
        }
        Ok(())
    }

    async fn list_users(&self, options: ListOptions) -> DomainResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(options.apply(state.users.values().cloned()))
    }
}

#[async_trait]
impl LabelStore for InMemoryStorage {
    async fn create_label(&self, label: &Label) -> DomainResult<()> {
        require_id(EntityKind::Label, label.id)?;
        let mut state = self.state.write().await;
        if state.labels.contains_key(&label.id) {
            return Err(DomainError::already_exists(EntityKind::Label, label.id));
        }
        state.labels.insert(label.id, label.clone());
        Ok(())
    }

    async fn get_label(&self, id: i64) -> DomainResult<Label> {
        let state = self.state.read().await;
        state.labels.get(&id).cloned().ok_or_else(|| DomainError::not_found(EntityKind::Label, id))
    }

    async fn upsert_label(&self, label: &Label) -> DomainResult<()> {
        require_id(EntityKind::Label, label.id)?;
        self.state.write().await.labels.insert(label.id, label.clone());
        Ok(())
    }

    async fn delete_label(&self, id: i64) -> DomainResult<()> {
        require_id(EntityKind::Label, id)?;
        let mut state = self.state.write().await;
        if state.labels.remove(&id).is_none() {
            return Err(DomainError::not_found(EntityKind::Label, id));
        }
        for stored in state.issues.values_mut() {
            stored.label_ids.remove(&id);
        }
        Ok(())
    }

    async fn list_labels(&self, options: ListOptions) -> DomainResult<Vec<Label>> {
        let state = self.state.read().await;
        Ok(options.apply(state.labels.values().cloned()))
    }
}

#[async_trait]
impl MilestoneStore for InMemoryStorage {
    async fn create_milestone(&self, milestone: &Milestone) -> DomainResult<()> {
        require_id(EntityKind::Milestone, milestone.id)?;
        let mut state = self.state.write().await;
        if state.milestones.contains_key(&milestone.id) {
            return Err(DomainError::already_exists(EntityKind::Milestone, milestone.id));
        }
        state.milestones.insert(milestone.id, milestone.clone());
        Ok(())
    }

    async fn get_milestone(&self, id: i64) -> DomainResult<Milestone> {
        let state = self.state.read().await;
        state
            .milestones
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(EntityKind::Milestone, id))
    }

    async fn upsert_milestone(&self, milestone: &Milestone) -> DomainResult<()> {
        require_id(EntityKind::Milestone, milestone.id)?;
        let mut state = self.state.write().await;
        let mut row = milestone.clone();
        if let Some(existing) = state.milestones.get(&milestone.id) {
            row.created_at = existing.created_at;
        }
        state.milestones.insert(milestone.id, row);
        Ok(())
    }

    async fn delete_milestone(&self, id: i64) -> DomainResult<()> {
        require_id(EntityKind::Milestone, id)?;
        let mut state = self.state.write().await;
        if state.milestones.remove(&id).is_none() {
            return Err(DomainError::not_found(EntityKind::Milestone, id));
        }
        for stored in state.issues.values_mut() {
            if stored.issue.milestone_id == Some(id) {
                stored.issue.milestone_id = None;
            }
        }
        Ok(())
    }

    async fn list_milestones(&self, options: ListOptions) -> DomainResult<Vec<Milestone>> {
        let state = self.state.read().await;
        Ok(options.apply(state.milestones.values().cloned()))
    }
}

#[async_trait]
impl IssueStore for InMemoryStorage {
    async fn create_issue(&self, issue: &Issue) -> DomainResult<()> {
        issue.validate().map_err(DomainError::ValidationFailed)?;
        let mut state = self.state.write().await;
        let mut staged = state.clone();
        staged.write_issue(issue, true)?;
        *state = staged;
        Ok(())
    }

    async fn get_issue(&self, id: i64) -> DomainResult<IssueDetails> {
        let state = self.state.read().await;
        state
            .issues
            .get(&id)
            .map(|stored| state.details(stored))
            .ok_or_else(|| DomainError::not_found(EntityKind::Issue, id))
    }

    async fn get_issue_by_number(&self, number: i32) -> DomainResult<IssueDetails> {
        let state = self.state.read().await;
        state
            .issues
            .values()
            .find(|stored| stored.issue.number == number)
            .map(|stored| state.details(stored))
            .ok_or_else(|| DomainError::not_found(EntityKind::Issue, format!("number {number}")))
    }

    async fn upsert_issue(&self, issue: &Issue) -> DomainResult<()> {
        self.batch_upsert_issues(std::slice::from_ref(issue)).await
    }

    async fn delete_issue(&self, id: i64) -> DomainResult<()> {
        require_id(EntityKind::Issue, id)?;
        let mut state = self.state.write().await;
        state
            .issues
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found(EntityKind::Issue, id))
    }

    async fn list_issues(&self, filter: IssueFilter) -> DomainResult<Vec<IssueDetails>> {
        let state = self.state.read().await;
        let wanted_state = filter.state.state();
        let label_ids: Option<BTreeSet<i64>> = filter.label.as_ref().map(|name| {
            state.labels.values().filter(|l| &l.name == name).map(|l| l.id).collect()
        });

        let mut matches: Vec<&StoredIssue> = state
            .issues
            .values()
            .filter(|stored| wanted_state.map_or(true, |s| stored.issue.state == s))
            .filter(|stored| {
                label_ids
                    .as_ref()
                    .map_or(true, |ids| !stored.label_ids.is_disjoint(ids))
            })
            .collect();
        matches.sort_by(|a, b| {
            b.issue
                .created_at
                .cmp(&a.issue.created_at)
                .then(b.issue.id.cmp(&a.issue.id))
        });

        Ok(filter.page.apply(matches).into_iter().map(|stored| state.details(stored)).collect())
    }

    async fn batch_upsert_issues(&self, issues: &[Issue]) -> DomainResult<()> {
        for issue in issues {
            issue.validate().map_err(DomainError::ValidationFailed)?;
        }

        let mut state = self.state.write().await;
        let mut staged = state.clone();
        for issue in issues {
            staged.write_issue(issue, false)?;
        }
        *state = staged;
        Ok(())
    }
}

#[async_trait]
impl RepositoryStore for InMemoryStorage {
    async fn create_repository(&self, repository: &Repository) -> DomainResult<()> {
        require_id(EntityKind::Repository, repository.id)?;
        let mut state = self.state.write().await;
        if state.repositories.contains_key(&repository.id)
            || state.repositories.values().any(|r| r.full_name == repository.full_name)
        {
            return Err(DomainError::already_exists(EntityKind::Repository, &repository.full_name));
        }
        state.repositories.insert(repository.id, repository.clone());
        Ok(())
    }

    async fn get_repository(&self, id: i64) -> DomainResult<Repository> {
        let state = self.state.read().await;
        state
            .repositories
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(EntityKind::Repository, id))
    }

    async fn get_repository_by_full_name(&self, full_name: &str) -> DomainResult<Repository> {
        let state = self.state.read().await;
        state
            .repositories
            .values()
            .find(|r| r.full_name == full_name)
            .cloned()
            .ok_or_else(|| DomainError::not_found(EntityKind::Repository, full_name))
    }

    async fn upsert_repository(&self, repository: &Repository) -> DomainResult<()> {
        require_id(EntityKind::Repository, repository.id)?;
        if repository.full_name.trim().is_empty() {
            return Err(DomainError::ValidationFailed(format!(
                "repository {} has an empty full name",
                repository.id
            )));
        }

        let mut state = self.state.write().await;
        if state
            .repositories
            .values()
            .any(|r| r.full_name == repository.full_name && r.id != repository.id)
        {
            return Err(DomainError::already_exists(EntityKind::Repository, &repository.full_name));
        }

        let mut row = repository.clone();
        if let Some(existing) = state.repositories.get(&repository.id) {
            row.created_at = existing.created_at;
        }
        state.repositories.insert(repository.id, row);
        Ok(())
    }

    async fn delete_repository(&self, id: i64) -> DomainResult<()> {
        require_id(EntityKind::Repository, id)?;
        let mut state = self.state.write().await;
        state
            .repositories
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found(EntityKind::Repository, id))
    }

    async fn list_repositories(&self, filter: RepositoryFilter) -> DomainResult<Vec<Repository>> {
        let state = self.state.read().await;
        let mut matches: Vec<Repository> = state
            .repositories
            .values()
            .filter(|r| filter.include_archived || !r.archived)
            .filter(|r| filter.owner_login.as_ref().map_or(true, |owner| &r.owner_login == owner))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(filter.page.apply(matches))
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn close(&self) -> DomainResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_failed_batch_leaves_state_untouched() {
        let store = InMemoryStorage::new();
        store.upsert_issue(&Issue::new(1, 1, "existing")).await.unwrap();

        let batch = vec![
            Issue::new(1, 1, "existing, renamed"),
            Issue::new(2, 2, "new"),
            Issue::new(3, 2, "duplicate number"),
        ];
        let err = store.batch_upsert_issues(&batch).await.unwrap_err();
        assert!(err.is_already_exists());

        assert_eq!(store.get_issue(1).await.unwrap().issue.title, "existing");
        assert!(store.get_issue(2).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_links_accumulate_across_upserts() {
        let store = InMemoryStorage::new();
        store.upsert_user(&User::new(1, "octocat")).await.unwrap();
        store.upsert_user(&User::new(2, "hubot")).await.unwrap();

        store.upsert_issue(&Issue::new(500, 7, "Crash").with_assignees(vec![2])).await.unwrap();
        store.upsert_issue(&Issue::new(500, 7, "Crash").with_assignees(vec![1, 2])).await.unwrap();

        let stored = store.get_issue(500).await.unwrap();
        assert_eq!(stored.issue.assignee_ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_unknown_assignee_fails_the_write() {
        let store = InMemoryStorage::new();
        let err = store
            .upsert_issue(&Issue::new(500, 7, "Crash").with_assignees(vec![9]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Database { .. }));
        assert!(store.get_issue(500).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_milestone_clears_issue_reference() {
        let store = InMemoryStorage::new();
        let due = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        store.upsert_milestone(&Milestone::new(3, 1, "v1").with_due_on(due)).await.unwrap();
        store.upsert_issue(&Issue::new(500, 7, "Crash").with_milestone(3)).await.unwrap();

        store.delete_milestone(3).await.unwrap();

        let stored = store.get_issue(500).await.unwrap();
        assert_eq!(stored.issue.milestone_id, None);
        assert!(stored.milestone.is_none());
    }
}
