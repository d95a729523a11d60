//! SQLite implementation of the LabelStore.

use async_trait::async_trait;

use crate::domain::errors::{require_id, DomainError, DomainResult, EntityKind};
use crate::domain::models::Label;
use crate::domain::ports::{LabelStore, ListOptions};

use super::{is_unique_violation, storage_error, SqliteStorage};

#[async_trait]
impl LabelStore for SqliteStorage {
    async fn create_label(&self, label: &Label) -> DomainResult<()> {
        require_id(EntityKind::Label, label.id)?;

        sqlx::query("INSERT INTO labels (id, name, color, description) VALUES (?, ?, ?, ?)")
            .bind(label.id)
            .bind(&label.name)
            .bind(&label.color)
            .bind(&label.description)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::already_exists(EntityKind::Label, label.id)
                } else {
                    storage_error("create_label", label.id, e)
                }
            })?;

        Ok(())
    }

    async fn get_label(&self, id: i64) -> DomainResult<Label> {
        let row: Option<LabelRow> = sqlx::query_as("SELECT id, name, color, description FROM labels WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("get_label", id, e))?;

        row.map(Label::from).ok_or_else(|| DomainError::not_found(EntityKind::Label, id))
    }

    async fn upsert_label(&self, label: &Label) -> DomainResult<()> {
        require_id(EntityKind::Label, label.id)?;

        sqlx::query(
            r#"INSERT INTO labels (id, name, color, description) VALUES (?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   color = excluded.color,
                   description = excluded.description"#
        )
        .bind(label.id)
        .bind(&label.name)
        .bind(&label.color)
        .bind(&label.description)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("upsert_label", label.id, e))?;

        Ok(())
    }

    async fn delete_label(&self, id: i64) -> DomainResult<()> {
        require_id(EntityKind::Label, id)?;

        let result = sqlx::query("DELETE FROM labels WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("delete_label", id, e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(EntityKind::Label, id));
        }

        Ok(())
    }

    async fn list_labels(&self, options: ListOptions) -> DomainResult<Vec<Label>> {
        let rows: Vec<LabelRow> = sqlx::query_as(
            "SELECT id, name, color, description FROM labels ORDER BY id LIMIT ? OFFSET ?"
        )
        .bind(options.sql_limit())
        .bind(i64::from(options.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("list_labels", "*", e))?;

        Ok(rows.into_iter().map(Label::from).collect())
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct LabelRow {
    id: i64,
    name: String,
    color: String,
    description: String,
}

impl From<LabelRow> for Label {
    fn from(row: LabelRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            color: row.color,
            description: row.description,
        }
    }
}
