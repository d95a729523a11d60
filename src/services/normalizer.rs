//! Conversion from raw remote records to the entity model.
//!
//! Every function here is pure. Embedded records are flattened into id
//! references; the referenced entities are produced separately so the caller
//! can persist them before the issues that point at them.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    derive_full_name, Issue, ItemState, Label, Milestone, RemoteIssue, RemoteLabel, RemoteMilestone,
    RemoteRepository, RemoteUser, Repository, User, DEFAULT_BRANCH,
};

fn parse_remote_state(kind: &str, id: i64, state: &str) -> DomainResult<ItemState> {
    ItemState::from_str(state)
        .ok_or_else(|| DomainError::ValidationFailed(format!("{kind} {id} has unknown state {state:?}")))
}

pub fn normalize_user(remote: &RemoteUser) -> User {
    User {
        id: remote.id,
        login: remote.login.clone(),
        avatar_url: remote.avatar_url.clone(),
        html_url: remote.html_url.clone(),
    }
}

pub fn normalize_label(remote: &RemoteLabel) -> Label {
    Label {
        id: remote.id,
        name: remote.name.clone(),
        color: remote.color.clone(),
        description: remote.description.clone().unwrap_or_default(),
    }
}

pub fn normalize_milestone(remote: &RemoteMilestone) -> DomainResult<Milestone> {
    Ok(Milestone {
        id: remote.id,
        number: remote.number,
        title: remote.title.clone(),
        description: remote.description.clone().unwrap_or_default(),
        state: parse_remote_state("milestone", remote.id, &remote.state)?,
        due_on: remote.due_on,
        created_at: remote.created_at,
        updated_at: remote.updated_at,
    })
}

/// Flatten an issue. Label and assignee ids keep payload order.
pub fn normalize_issue(remote: &RemoteIssue) -> DomainResult<Issue> {
    Ok(Issue {
        id: remote.id,
        number: remote.number,
        title: remote.title.clone(),
        body: remote.body.clone().unwrap_or_default(),
        state: parse_remote_state("issue", remote.id, &remote.state)?,
        comments: remote.comments,
        locked: remote.locked,
        html_url: remote.html_url.clone(),
        created_at: remote.created_at,
        updated_at: remote.updated_at,
        closed_at: remote.closed_at,
        creator_id: remote.user.as_ref().map(|u| u.id),
        milestone_id: remote.milestone.as_ref().map(|m| m.id),
        label_ids: remote.labels.iter().map(|l| l.id).collect(),
        assignee_ids: remote.assignees.iter().map(|u| u.id).collect(),
    })
}

pub fn normalize_repository(remote: &RemoteRepository) -> Repository {
    let owner_login = remote.owner.as_ref().map(|o| o.login.clone()).unwrap_or_default();
    let full_name = remote
        .full_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| derive_full_name(&owner_login, &remote.name));
    let default_branch = remote
        .default_branch
        .clone()
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BRANCH.to_string());

    Repository {
        id: remote.id,
        name: remote.name.clone(),
        full_name,
        owner_login,
        description: remote.description.clone().unwrap_or_default(),
        private: remote.private,
        archived: remote.archived,
        disabled: remote.disabled,
        html_url: remote.html_url.clone(),
        default_branch,
        language: remote.language.clone().unwrap_or_default(),
        stargazers_count: remote.stargazers_count,
        forks_count: remote.forks_count,
        open_issues_count: remote.open_issues_count,
        created_at: remote.created_at,
        updated_at: remote.updated_at,
        pushed_at: remote.pushed_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::RemoteOwner;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn remote_issue(id: i64, number: i32) -> RemoteIssue {
        let at = Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap();
        RemoteIssue {
            id,
            number,
            title: format!("issue {number}"),
            body: None,
            state: "open".to_string(),
            comments: 0,
            locked: false,
            html_url: String::new(),
            created_at: at,
            updated_at: at,
            closed_at: None,
            user: None,
            labels: Vec::new(),
            assignees: Vec::new(),
            milestone: None,
        }
    }

    fn remote_repository() -> RemoteRepository {
        let at = Utc.with_ymd_and_hms(2011, 1, 26, 19, 1, 12).unwrap();
        RemoteRepository {
            id: 1296269,
            name: "Hello-World".to_string(),
            full_name: None,
            owner: Some(RemoteOwner { login: "octocat".to_string() }),
            description: None,
            private: false,
            archived: false,
            disabled: false,
            html_url: String::new(),
            default_branch: None,
            language: None,
            stargazers_count: 80,
            forks_count: 9,
            open_issues_count: 0,
            created_at: at,
            updated_at: at,
            pushed_at: None,
        }
    }

    #[test]
    fn test_issue_defaults() {
        let issue = normalize_issue(&remote_issue(1, 1)).unwrap();
        assert_eq!(issue.body, "");
        assert_eq!(issue.creator_id, None);
        assert_eq!(issue.milestone_id, None);
        assert_eq!(issue.state, ItemState::Open);
    }

    #[test]
    fn test_issue_unknown_state_is_rejected() {
        let mut remote = remote_issue(1, 1);
        remote.state = "merged".to_string();
        assert!(matches!(normalize_issue(&remote), Err(DomainError::ValidationFailed(_))));
    }

    #[test]
    fn test_repository_derives_full_name_and_branch() {
        let repository = normalize_repository(&remote_repository());
        assert_eq!(repository.full_name, "octocat/Hello-World");
        assert_eq!(repository.owner_login, "octocat");
        assert_eq!(repository.default_branch, "main");
    }

    #[test]
    fn test_repository_keeps_reported_values() {
        let mut remote = remote_repository();
        remote.full_name = Some("octocat/renamed".to_string());
        remote.default_branch = Some("trunk".to_string());
        let repository = normalize_repository(&remote);
        assert_eq!(repository.full_name, "octocat/renamed");
        assert_eq!(repository.default_branch, "trunk");
    }

    #[test]
    fn test_milestone_without_due_on() {
        let remote = RemoteMilestone {
            id: 99,
            number: 2,
            title: "v1.0".to_string(),
            description: None,
            state: "closed".to_string(),
            due_on: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let milestone = normalize_milestone(&remote).unwrap();
        assert_eq!(milestone.due_on, None);
        assert_eq!(milestone.description, "");
        assert_eq!(milestone.state, ItemState::Closed);
    }

    proptest! {
        #[test]
        fn prop_issue_references_follow_payload(
            label_ids in proptest::collection::vec(1i64..10_000, 0..8),
            assignee_ids in proptest::collection::vec(1i64..10_000, 0..4),
            creator in proptest::option::of(1i64..10_000),
        ) {
            let mut remote = remote_issue(500, 7);
            remote.labels = label_ids
                .iter()
                .map(|id| RemoteLabel { id: *id, name: format!("l{id}"), color: String::new(), description: None })
                .collect();
            remote.assignees = assignee_ids
                .iter()
                .map(|id| RemoteUser { id: *id, login: format!("u{id}"), avatar_url: String::new(), html_url: String::new() })
                .collect();
            remote.user = creator.map(|id| RemoteUser { id, login: format!("u{id}"), avatar_url: String::new(), html_url: String::new() });

            let issue = normalize_issue(&remote).unwrap();
            prop_assert_eq!(issue.label_ids, label_ids);
            prop_assert_eq!(issue.assignee_ids, assignee_ids);
            prop_assert_eq!(issue.creator_id, creator);
        }
    }
}
