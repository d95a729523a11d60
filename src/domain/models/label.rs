//! Label domain model.

use serde::{Deserialize, Serialize};

/// An issue label. Names are not unique locally; the remote id is trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: i64,
    pub name: String,
    /// Hex colour without the leading `#`.
    pub color: String,
    pub description: String,
}

impl Label {
    pub fn new(id: i64, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            color: color.into(),
            description: String::new(),
        }
    }
}
