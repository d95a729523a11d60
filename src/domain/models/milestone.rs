//! Milestone domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ItemState;

/// A milestone an issue may be attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: i64,
    pub number: i32,
    pub title: String,
    pub description: String,
    pub state: ItemState,
    /// Absent clears any stored due date on upsert.
    pub due_on: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Milestone {
    pub fn new(id: i64, number: i32, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            number,
            title: title.into(),
            description: String::new(),
            state: ItemState::Open,
            due_on: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_due_on(mut self, due_on: DateTime<Utc>) -> Self {
        self.due_on = Some(due_on);
        self
    }
}
