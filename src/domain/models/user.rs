//! User domain model.

use serde::{Deserialize, Serialize};

/// A remote account referenced as an issue creator or assignee.
///
/// `login` is descriptive only; identity is the remote id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub avatar_url: String,
    /// Profile page URL.
    pub html_url: String,
}

impl User {
    pub fn new(id: i64, login: impl Into<String>) -> Self {
        Self {
            id,
            login: login.into(),
            avatar_url: String::new(),
            html_url: String::new(),
        }
    }
}
