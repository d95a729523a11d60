use chrono::{DateTime, Duration, TimeZone, Utc};
use issue_mirror::domain::models::{RemoteIssue, RemoteLabel, RemoteMilestone, RemoteUser};
use serde_json::{json, Value};

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 9, 12, 0, 0).unwrap()
}

pub fn remote_user(id: i64, login: &str) -> RemoteUser {
    RemoteUser {
        id,
        login: login.to_string(),
        avatar_url: format!("https://avatars.example.com/u/{id}"),
        html_url: format!("https://github.com/{login}"),
    }
}

pub fn remote_label(id: i64, name: &str) -> RemoteLabel {
    RemoteLabel {
        id,
        name: name.to_string(),
        color: "d73a4a".to_string(),
        description: None,
    }
}

pub fn remote_milestone(id: i64, number: i32, title: &str) -> RemoteMilestone {
    RemoteMilestone {
        id,
        number,
        title: title.to_string(),
        description: None,
        state: "open".to_string(),
        due_on: None,
        created_at: base_time(),
        updated_at: base_time(),
    }
}

/// An open issue created by user 1 (`octocat`). Later ids are created later.
pub fn remote_issue(id: i64, number: i32) -> RemoteIssue {
    let created_at = base_time() + Duration::minutes(id);
    RemoteIssue {
        id,
        number,
        title: format!("Issue {number}"),
        body: Some(format!("Body of issue {number}")),
        state: "open".to_string(),
        comments: 0,
        locked: false,
        html_url: format!("https://github.com/octocat/Hello-World/issues/{number}"),
        created_at,
        updated_at: created_at,
        closed_at: None,
        user: Some(remote_user(1, "octocat")),
        labels: Vec::new(),
        assignees: Vec::new(),
        milestone: None,
    }
}

pub fn issue_json(id: i64, number: i32) -> Value {
    serde_json::to_value(remote_issue(id, number)).expect("issue serializes")
}

pub fn repository_json() -> Value {
    json!({
        "id": 1296269,
        "name": "Hello-World",
        "full_name": "octocat/Hello-World",
        "owner": { "login": "octocat", "id": 1 },
        "description": "This your first repo!",
        "private": false,
        "archived": false,
        "disabled": false,
        "html_url": "https://github.com/octocat/Hello-World",
        "default_branch": "master",
        "language": null,
        "stargazers_count": 80,
        "forks_count": 9,
        "open_issues_count": 0,
        "created_at": "2011-01-26T19:01:12Z",
        "updated_at": "2011-01-26T19:14:43Z",
        "pushed_at": "2011-01-26T19:06:43Z"
    })
}
