//! SQLite implementation of the MilestoneStore.

use async_trait::async_trait;

use crate::domain::errors::{require_id, DomainError, DomainResult, EntityKind};
use crate::domain::models::Milestone;
use crate::domain::ports::{ListOptions, MilestoneStore};

use super::{
    format_datetime, is_unique_violation, parse_datetime, parse_optional_datetime, parse_state,
    storage_error, SqliteStorage,
};

const SELECT_MILESTONE: &str =
    "SELECT id, number, title, description, state, due_on, created_at, updated_at FROM milestones";

#[async_trait]
impl MilestoneStore for SqliteStorage {
    async fn create_milestone(&self, milestone: &Milestone) -> DomainResult<()> {
        require_id(EntityKind::Milestone, milestone.id)?;

        sqlx::query(
            r#"INSERT INTO milestones (id, number, title, description, state, due_on, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(milestone.id)
        .bind(milestone.number)
        .bind(&milestone.title)
        .bind(&milestone.description)
        .bind(milestone.state.as_str())
        .bind(milestone.due_on.as_ref().map(format_datetime))
        .bind(format_datetime(&milestone.created_at))
        .bind(format_datetime(&milestone.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::already_exists(EntityKind::Milestone, milestone.id)
            } else {
                storage_error("create_milestone", milestone.id, e)
            }
        })?;

        Ok(())
    }

    async fn get_milestone(&self, id: i64) -> DomainResult<Milestone> {
        let row: Option<MilestoneRow> = sqlx::query_as(&format!("{SELECT_MILESTONE} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("get_milestone", id, e))?;

        row.map(Milestone::try_from)
            .transpose()?
            .ok_or_else(|| DomainError::not_found(EntityKind::Milestone, id))
    }

    async fn upsert_milestone(&self, milestone: &Milestone) -> DomainResult<()> {
        require_id(EntityKind::Milestone, milestone.id)?;

        // An absent due date overwrites whatever was stored.
        sqlx::query(
            r#"INSERT INTO milestones (id, number, title, description, state, due_on, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   number = excluded.number,
                   title = excluded.title,
                   description = excluded.description,
                   state = excluded.state,
                   due_on = excluded.due_on,
                   updated_at = excluded.updated_at"#
        )
        .bind(milestone.id)
        .bind(milestone.number)
        .bind(&milestone.title)
        .bind(&milestone.description)
        .bind(milestone.state.as_str())
        .bind(milestone.due_on.as_ref().map(format_datetime))
        .bind(format_datetime(&milestone.created_at))
        .bind(format_datetime(&milestone.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("upsert_milestone", milestone.id, e))?;

        Ok(())
    }

    async fn delete_milestone(&self, id: i64) -> DomainResult<()> {
        require_id(EntityKind::Milestone, id)?;

        // Issues referencing it fall back to no milestone.
        let result = sqlx::query("DELETE FROM milestones WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("delete_milestone", id, e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(EntityKind::Milestone, id));
        }

        Ok(())
    }

    async fn list_milestones(&self, options: ListOptions) -> DomainResult<Vec<Milestone>> {
        let rows: Vec<MilestoneRow> = sqlx::query_as(&format!("{SELECT_MILESTONE} ORDER BY id LIMIT ? OFFSET ?"))
            .bind(options.sql_limit())
            .bind(i64::from(options.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("list_milestones", "*", e))?;

        rows.into_iter().map(Milestone::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct MilestoneRow {
    id: i64,
    number: i32,
    title: String,
    description: String,
    state: String,
    due_on: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<MilestoneRow> for Milestone {
    type Error = DomainError;

    fn try_from(row: MilestoneRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            number: row.number,
            title: row.title,
            description: row.description,
            state: parse_state(&row.state)?,
            due_on: parse_optional_datetime(row.due_on)?,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}
