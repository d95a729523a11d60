//! SQLite implementation of the Storage port.
//!
//! The per-entity store traits are implemented in the sibling modules; this
//! module owns the shared handle and the connection lifecycle.

use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};

use crate::domain::errors::DomainResult;
use crate::domain::ports::Storage;

use super::storage_error;

#[derive(Clone)]
pub struct SqliteStorage {
    pub(super) pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn close(&self) -> DomainResult<()> {
        // Closing an already closed pool returns immediately.
        self.pool.close().await;
        Ok(())
    }
}

/// Check that a row with the given id exists in `table`.
pub(super) async fn row_exists(conn: &mut SqliteConnection, table: &'static str, id: i64) -> DomainResult<bool> {
    let query = format!("SELECT 1 FROM {table} WHERE id = ?");
    let row: Option<(i64,)> = sqlx::query_as(&query)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| storage_error("row_exists", format!("{table} {id}"), e))?;
    Ok(row.is_some())
}
