//! SQLite implementation of the RepositoryStore.

use async_trait::async_trait;
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;

use crate::domain::errors::{require_id, DomainError, DomainResult, EntityKind};
use crate::domain::models::Repository;
use crate::domain::ports::{RepositoryFilter, RepositoryStore};

use super::{
    format_datetime, is_unique_violation, parse_datetime, parse_optional_datetime, storage_error,
    SqliteStorage,
};

const SELECT_REPOSITORY: &str = r#"SELECT id, name, full_name, owner_login, description, private, archived,
    disabled, html_url, default_branch, language, stargazers_count, forks_count, open_issues_count,
    created_at, updated_at, pushed_at FROM repositories"#;

const INSERT_REPOSITORY: &str = r#"INSERT INTO repositories (id, name, full_name, owner_login, description,
    private, archived, disabled, html_url, default_branch, language, stargazers_count, forks_count,
    open_issues_count, created_at, updated_at, pushed_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#;

fn validate_repository(repository: &Repository) -> DomainResult<()> {
    require_id(EntityKind::Repository, repository.id)?;
    if repository.full_name.trim().is_empty() {
        return Err(DomainError::ValidationFailed(format!(
            "repository {} has an empty full name",
            repository.id
        )));
    }
    Ok(())
}

fn bind_repository<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    repository: &'q Repository,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    query
        .bind(repository.id)
        .bind(&repository.name)
        .bind(&repository.full_name)
        .bind(&repository.owner_login)
        .bind(&repository.description)
        .bind(repository.private)
        .bind(repository.archived)
        .bind(repository.disabled)
        .bind(&repository.html_url)
        .bind(&repository.default_branch)
        .bind(&repository.language)
        .bind(repository.stargazers_count)
        .bind(repository.forks_count)
        .bind(repository.open_issues_count)
        .bind(format_datetime(&repository.created_at))
        .bind(format_datetime(&repository.updated_at))
        .bind(repository.pushed_at.as_ref().map(format_datetime))
}

#[async_trait]
impl RepositoryStore for SqliteStorage {
    async fn create_repository(&self, repository: &Repository) -> DomainResult<()> {
        validate_repository(repository)?;

        bind_repository(sqlx::query(INSERT_REPOSITORY), repository)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::already_exists(EntityKind::Repository, &repository.full_name)
                } else {
                    storage_error("create_repository", repository.id, e)
                }
            })?;

        Ok(())
    }

    async fn get_repository(&self, id: i64) -> DomainResult<Repository> {
        let row: Option<RepositoryRow> = sqlx::query_as(&format!("{SELECT_REPOSITORY} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("get_repository", id, e))?;

        row.map(Repository::try_from)
            .transpose()?
            .ok_or_else(|| DomainError::not_found(EntityKind::Repository, id))
    }

    async fn get_repository_by_full_name(&self, full_name: &str) -> DomainResult<Repository> {
        let row: Option<RepositoryRow> = sqlx::query_as(&format!("{SELECT_REPOSITORY} WHERE full_name = ?"))
            .bind(full_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("get_repository_by_full_name", full_name, e))?;

        row.map(Repository::try_from)
            .transpose()?
            .ok_or_else(|| DomainError::not_found(EntityKind::Repository, full_name))
    }

    async fn upsert_repository(&self, repository: &Repository) -> DomainResult<()> {
        validate_repository(repository)?;

        let sql = format!(
            r#"{INSERT_REPOSITORY}
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   full_name = excluded.full_name,
                   owner_login = excluded.owner_login,
                   description = excluded.description,
                   private = excluded.private,
                   archived = excluded.archived,
                   disabled = excluded.disabled,
                   html_url = excluded.html_url,
                   default_branch = excluded.default_branch,
                   language = excluded.language,
                   stargazers_count = excluded.stargazers_count,
                   forks_count = excluded.forks_count,
                   open_issues_count = excluded.open_issues_count,
                   updated_at = excluded.updated_at,
                   pushed_at = excluded.pushed_at"#
        );

        // A full-name collision with a different id is still a conflict.
        bind_repository(sqlx::query(&sql), repository)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::already_exists(EntityKind::Repository, &repository.full_name)
                } else {
                    storage_error("upsert_repository", repository.id, e)
                }
            })?;

        Ok(())
    }

    async fn delete_repository(&self, id: i64) -> DomainResult<()> {
        require_id(EntityKind::Repository, id)?;

        let result = sqlx::query("DELETE FROM repositories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("delete_repository", id, e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(EntityKind::Repository, id));
        }

        Ok(())
    }

    async fn list_repositories(&self, filter: RepositoryFilter) -> DomainResult<Vec<Repository>> {
        let mut query = format!("{SELECT_REPOSITORY} WHERE 1=1");
        let mut bindings: Vec<&str> = Vec::new();

        if let Some(owner) = &filter.owner_login {
            query.push_str(" AND owner_login = ?");
            bindings.push(owner.as_str());
        }
        if !filter.include_archived {
            query.push_str(" AND archived = 0");
        }

        query.push_str(" ORDER BY full_name LIMIT ? OFFSET ?");

        let mut q = sqlx::query_as::<_, RepositoryRow>(&query);
        for binding in bindings {
            q = q.bind(binding);
        }

        let rows = q
            .bind(filter.page.sql_limit())
            .bind(i64::from(filter.page.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("list_repositories", "*", e))?;

        rows.into_iter().map(Repository::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct RepositoryRow {
    id: i64,
    name: String,
    full_name: String,
    owner_login: String,
    description: String,
    private: bool,
    archived: bool,
    disabled: bool,
    html_url: String,
    default_branch: String,
    language: String,
    stargazers_count: i32,
    forks_count: i32,
    open_issues_count: i32,
    created_at: String,
    updated_at: String,
    pushed_at: Option<String>,
}

impl TryFrom<RepositoryRow> for Repository {
    type Error = DomainError;

    fn try_from(row: RepositoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            full_name: row.full_name,
            owner_login: row.owner_login,
            description: row.description,
            private: row.private,
            archived: row.archived,
            disabled: row.disabled,
            html_url: row.html_url,
            default_branch: row.default_branch,
            language: row.language,
            stargazers_count: row.stargazers_count,
            forks_count: row.forks_count,
            open_issues_count: row.open_issues_count,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
            pushed_at: parse_optional_datetime(row.pushed_at)?,
        })
    }
}
