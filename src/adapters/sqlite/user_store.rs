//! SQLite implementation of the UserStore.

use async_trait::async_trait;

use crate::domain::errors::{require_id, DomainError, DomainResult, EntityKind};
use crate::domain::models::User;
use crate::domain::ports::{ListOptions, UserStore};

use super::{is_unique_violation, storage_error, SqliteStorage};

#[async_trait]
impl UserStore for SqliteStorage {
    async fn create_user(&self, user: &User) -> DomainResult<()> {
        require_id(EntityKind::User, user.id)?;

        sqlx::query("INSERT INTO users (id, login, avatar_url, html_url) VALUES (?, ?, ?, ?)")
            .bind(user.id)
            .bind(&user.login)
            .bind(&user.avatar_url)
            .bind(&user.html_url)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::already_exists(EntityKind::User, user.id)
                } else {
                    storage_error("create_user", user.id, e)
                }
            })?;

        Ok(())
    }

    async fn get_user(&self, id: i64) -> DomainResult<User> {
        let row: Option<UserRow> = sqlx::query_as("SELECT id, login, avatar_url, html_url FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("get_user", id, e))?;

        row.map(User::from).ok_or_else(|| DomainError::not_found(EntityKind::User, id))
    }

    async fn upsert_user(&self, user: &User) -> DomainResult<()> {
        require_id(EntityKind::User, user.id)?;

        sqlx::query(
            r#"INSERT INTO users (id, login, avatar_url, html_url) VALUES (?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   login = excluded.login,
                   avatar_url = excluded.avatar_url,
                   html_url = excluded.html_url"#
        )
        .bind(user.id)
        .bind(&user.login)
        .bind(&user.avatar_url)
        .bind(&user.html_url)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("upsert_user", user.id, e))?;

        Ok(())
    }

    async fn delete_user(&self, id: i64) -> DomainResult<()> {
        require_id(EntityKind::User, id)?;

        // Issues keep existing with a cleared creator; assignee links cascade.
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("delete_user", id, e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(EntityKind::User, id));
        }

        Ok(())
    }

    async fn list_users(&self, options: ListOptions) -> DomainResult<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, login, avatar_url, html_url FROM users ORDER BY id LIMIT ? OFFSET ?"
        )
        .bind(options.sql_limit())
        .bind(i64::from(options.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("list_users", "*", e))?;

        Ok(rows.into_iter().map(User::from).collect())
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct UserRow {
    id: i64,
    login: String,
    avatar_url: String,
    html_url: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            login: row.login,
            avatar_url: row.avatar_url,
            html_url: row.html_url,
        }
    }
}
