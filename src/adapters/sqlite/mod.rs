//! SQLite database adapters for the issue mirror.

pub mod connection;
pub mod issue_store;
pub mod label_store;
pub mod migrations;
pub mod milestone_store;
pub mod repository_store;
pub mod storage;
pub mod user_store;

pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError, PoolConfig};
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use storage::SqliteStorage;

use std::fmt::Display;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ItemState;

/// Format a timestamp as fixed-width RFC 3339 so text order is time order.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse an RFC3339 datetime string from a SQLite row field.
pub fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| DomainError::SerializationError(e.to_string()))
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an optional RFC3339 datetime string from a SQLite row field.
pub fn parse_optional_datetime(s: Option<String>) -> DomainResult<Option<DateTime<Utc>>> {
    s.map(|s| parse_datetime(&s)).transpose()
}

pub fn parse_state(s: &str) -> DomainResult<ItemState> {
    ItemState::from_str(s).ok_or_else(|| DomainError::SerializationError(format!("Invalid state: {s}")))
}

/// Map an engine error to a domain error carrying the operation and key.
///
/// Connectivity failures are reported as transient so callers can decide to
/// retry; everything else is a database error.
pub fn storage_error(operation: &str, key: impl Display, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => DomainError::TransientIo {
            operation: operation.to_string(),
            message: err.to_string(),
        },
        other => DomainError::Database {
            operation: operation.to_string(),
            key: key.to_string(),
            message: other.to_string(),
        },
    }
}

pub fn transaction_error(operation: &str, err: sqlx::Error) -> DomainError {
    DomainError::TransactionFailed {
        operation: operation.to_string(),
        message: err.to_string(),
    }
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),
}

pub async fn initialize_database(database_url: &str, config: Option<PoolConfig>) -> Result<SqlitePool, DatabaseError> {
    let pool = create_pool(database_url, config).await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}

/// Create an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = create_test_pool().await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_datetime_text_sorts_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap();
        let later = earlier + chrono::Duration::milliseconds(1500);
        assert!(format_datetime(&earlier) < format_datetime(&later));
        assert_eq!(parse_datetime(&format_datetime(&later)).unwrap(), later);
    }

    #[test]
    fn test_storage_error_classifies_pool_timeout_as_transient() {
        let err = storage_error("get_user", 1, sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DomainError::TransientIo { .. }));

        let err = storage_error("get_user", 1, sqlx::Error::RowNotFound);
        assert!(matches!(err, DomainError::Database { .. }));
    }
}
