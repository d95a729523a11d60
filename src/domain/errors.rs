//! Domain errors for the issue mirror.

use std::fmt;

use thiserror::Error;

/// The kinds of entity persisted by the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Issue,
    User,
    Label,
    Milestone,
    Repository,
}

impl EntityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::User => "user",
            Self::Label => "label",
            Self::Milestone => "milestone",
            Self::Repository => "repository",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain-level errors that can occur while mirroring.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: EntityKind, key: String },

    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: EntityKind, key: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("I/O error during {operation}: {message}")]
    TransientIo { operation: String, message: String },

    #[error("Transaction failed during {operation}: {message}")]
    TransactionFailed { operation: String, message: String },

    #[error("Database error during {operation} ({key}): {message}")]
    Database {
        operation: String,
        key: String,
        message: String,
    },

    #[error("Remote API returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn not_found(entity: EntityKind, key: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn already_exists(entity: EntityKind, key: impl fmt::Display) -> Self {
        Self::AlreadyExists {
            entity,
            key: key.to_string(),
        }
    }

    /// True when the error reports a missing entity, so callers can branch
    /// between create and update without parsing messages.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Reject ids that cannot be a remote primary key.
pub fn require_id(entity: EntityKind, id: i64) -> DomainResult<()> {
    if id <= 0 {
        return Err(DomainError::ValidationFailed(format!(
            "{entity} id must be positive, got {id}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display_and_predicate() {
        let err = DomainError::not_found(EntityKind::Issue, "number 999");
        assert!(err.is_not_found());
        assert!(!err.is_already_exists());
        assert_eq!(err.to_string(), "issue not found: number 999");
    }

    #[test]
    fn test_require_id_rejects_non_positive() {
        assert!(require_id(EntityKind::User, 1).is_ok());
        assert!(matches!(
            require_id(EntityKind::User, 0),
            Err(DomainError::ValidationFailed(_))
        ));
        assert!(require_id(EntityKind::Label, -4).is_err());
    }
}
