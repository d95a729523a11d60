//! SQLite implementation of the IssueStore.
//!
//! Issue writes run inside a transaction together with their label and
//! assignee links. Reads return [`IssueDetails`] with every association
//! loaded, so callers never have to chase references themselves.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use sqlx::SqliteConnection;

use crate::domain::errors::{require_id, DomainError, DomainResult, EntityKind};
use crate::domain::models::{Issue, IssueDetails, Label, Milestone, User};
use crate::domain::ports::{IssueFilter, IssueStore};

use super::label_store::LabelRow;
use super::milestone_store::MilestoneRow;
use super::storage::row_exists;
use super::user_store::UserRow;
use super::{
    format_datetime, is_unique_violation, parse_datetime, parse_optional_datetime, parse_state,
    storage_error, transaction_error, SqliteStorage,
};

const SELECT_ISSUE: &str = r#"SELECT id, number, title, body, state, comments, html_url, locked,
    created_at, updated_at, closed_at, user_id, milestone_id FROM issues"#;

const INSERT_ISSUE: &str = r#"INSERT INTO issues (id, number, title, body, state, comments, html_url,
    locked, created_at, updated_at, closed_at, user_id, milestone_id)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#;

// created_at is left untouched on conflict.
const UPSERT_ISSUE_SUFFIX: &str = r#"
    ON CONFLICT(id) DO UPDATE SET
        number = excluded.number,
        title = excluded.title,
        body = excluded.body,
        state = excluded.state,
        comments = excluded.comments,
        html_url = excluded.html_url,
        locked = excluded.locked,
        updated_at = excluded.updated_at,
        closed_at = excluded.closed_at,
        user_id = excluded.user_id,
        milestone_id = excluded.milestone_id"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Insert,
    Upsert,
}

fn validate_issue(issue: &Issue) -> DomainResult<()> {
    issue.validate().map_err(DomainError::ValidationFailed)
}

/// Keep a singular reference only if the referenced row is stored.
async fn resolve_reference(
    conn: &mut SqliteConnection,
    table: &'static str,
    issue_id: i64,
    reference: Option<i64>,
) -> DomainResult<Option<i64>> {
    let Some(id) = reference else {
        return Ok(None);
    };

    if row_exists(conn, table, id).await? {
        Ok(Some(id))
    } else {
        tracing::debug!(issue_id, table, referenced_id = id, "dropping reference to missing row");
        Ok(None)
    }
}

/// Write one issue row and add its links on an open connection.
async fn write_issue(conn: &mut SqliteConnection, issue: &Issue, mode: WriteMode) -> DomainResult<()> {
    let creator_id = resolve_reference(conn, "users", issue.id, issue.creator_id).await?;
    let milestone_id = resolve_reference(conn, "milestones", issue.id, issue.milestone_id).await?;

    let sql = match mode {
        WriteMode::Insert => INSERT_ISSUE.to_string(),
        WriteMode::Upsert => format!("{INSERT_ISSUE}{UPSERT_ISSUE_SUFFIX}"),
    };

    sqlx::query(&sql)
        .bind(issue.id)
        .bind(issue.number)
        .bind(&issue.title)
        .bind(&issue.body)
        .bind(issue.state.as_str())
        .bind(issue.comments)
        .bind(&issue.html_url)
        .bind(issue.locked)
        .bind(format_datetime(&issue.created_at))
        .bind(format_datetime(&issue.updated_at))
        .bind(issue.closed_at.as_ref().map(format_datetime))
        .bind(creator_id)
        .bind(milestone_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::already_exists(EntityKind::Issue, format!("number {}", issue.number))
            } else {
                storage_error("write_issue", issue.id, e)
            }
        })?;

    // Links are additive; existing ones are never removed here.
    for label_id in &issue.label_ids {
        sqlx::query("INSERT INTO issue_labels (issue_id, label_id) VALUES (?, ?) ON CONFLICT(issue_id, label_id) DO NOTHING")
            .bind(issue.id)
            .bind(label_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| storage_error("link_issue_label", format!("issue {} label {label_id}", issue.id), e))?;
    }

    for user_id in &issue.assignee_ids {
        sqlx::query("INSERT INTO issue_assignees (issue_id, user_id) VALUES (?, ?) ON CONFLICT(issue_id, user_id) DO NOTHING")
            .bind(issue.id)
            .bind(user_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| storage_error("link_issue_assignee", format!("issue {} user {user_id}", issue.id), e))?;
    }

    Ok(())
}

/// SQLite caps bound parameters per statement; `IN` lists are split at this size.
const IN_CHUNK: usize = 500;

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[derive(sqlx::FromRow)]
struct LinkedLabelRow {
    issue_id: i64,
    #[sqlx(flatten)]
    label: LabelRow,
}

#[derive(sqlx::FromRow)]
struct LinkedUserRow {
    issue_id: i64,
    #[sqlx(flatten)]
    user: UserRow,
}

impl SqliteStorage {
    /// Run `sql` once per chunk of `ids`, replacing `{ids}` with placeholders.
    async fn fetch_in<T>(&self, operation: &str, sql: &str, ids: &[i64]) -> DomainResult<Vec<T>>
    where
        T: for<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> + Send + Unpin,
    {
        let mut out = Vec::new();
        for chunk in ids.chunks(IN_CHUNK) {
            let query = sql.replace("{ids}", &placeholders(chunk.len()));
            let mut q = sqlx::query_as::<_, T>(&query);
            for id in chunk {
                q = q.bind(*id);
            }
            let rows = q
                .fetch_all(&self.pool)
                .await
                .map_err(|e| storage_error(operation, format!("{} ids", chunk.len()), e))?;
            out.extend(rows);
        }
        Ok(out)
    }

    /// Resolve associations for a set of rows with one query per association kind.
    async fn load_details(&self, rows: Vec<IssueRow>) -> DomainResult<Vec<IssueDetails>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let issues: Vec<Issue> = rows.into_iter().map(Issue::try_from).collect::<DomainResult<_>>()?;
        let issue_ids: Vec<i64> = issues.iter().map(|i| i.id).collect();
        let creator_ids: Vec<i64> = issues.iter().filter_map(|i| i.creator_id).collect::<BTreeSet<_>>().into_iter().collect();
        let milestone_ids: Vec<i64> = issues.iter().filter_map(|i| i.milestone_id).collect::<BTreeSet<_>>().into_iter().collect();

        let mut labels: HashMap<i64, Vec<Label>> = HashMap::new();
        let label_rows: Vec<LinkedLabelRow> = self
            .fetch_in(
                "load_issue_labels",
                r#"SELECT il.issue_id, l.id, l.name, l.color, l.description
                   FROM issue_labels il JOIN labels l ON l.id = il.label_id
                   WHERE il.issue_id IN ({ids}) ORDER BY il.issue_id, l.id"#,
                &issue_ids,
            )
            .await?;
        for row in label_rows {
            labels.entry(row.issue_id).or_default().push(row.label.into());
        }

        let mut assignees: HashMap<i64, Vec<User>> = HashMap::new();
        let assignee_rows: Vec<LinkedUserRow> = self
            .fetch_in(
                "load_issue_assignees",
                r#"SELECT ia.issue_id, u.id, u.login, u.avatar_url, u.html_url
                   FROM issue_assignees ia JOIN users u ON u.id = ia.user_id
                   WHERE ia.issue_id IN ({ids}) ORDER BY ia.issue_id, u.id"#,
                &issue_ids,
            )
            .await?;
        for row in assignee_rows {
            assignees.entry(row.issue_id).or_default().push(row.user.into());
        }

        let creators: HashMap<i64, User> = self
            .fetch_in::<UserRow>(
                "load_issue_creators",
                "SELECT id, login, avatar_url, html_url FROM users WHERE id IN ({ids})",
                &creator_ids,
            )
            .await?
            .into_iter()
            .map(|row| {
                let user = User::from(row);
                (user.id, user)
            })
            .collect();

        let mut milestones: HashMap<i64, Milestone> = HashMap::new();
        let milestone_rows: Vec<MilestoneRow> = self
            .fetch_in(
                "load_issue_milestones",
                "SELECT id, number, title, description, state, due_on, created_at, updated_at FROM milestones WHERE id IN ({ids})",
                &milestone_ids,
            )
            .await?;
        for row in milestone_rows {
            let milestone = Milestone::try_from(row)?;
            milestones.insert(milestone.id, milestone);
        }

        Ok(issues
            .into_iter()
            .map(|mut issue| {
                let labels = labels.remove(&issue.id).unwrap_or_default();
                let assignees = assignees.remove(&issue.id).unwrap_or_default();
                issue.label_ids = labels.iter().map(|l| l.id).collect();
                issue.assignee_ids = assignees.iter().map(|u| u.id).collect();
                IssueDetails {
                    creator: issue.creator_id.and_then(|id| creators.get(&id).cloned()),
                    milestone: issue.milestone_id.and_then(|id| milestones.get(&id).cloned()),
                    issue,
                    labels,
                    assignees,
                }
            })
            .collect())
    }

    async fn get_issue_where(&self, column: &'static str, key: i64, not_found: String) -> DomainResult<IssueDetails> {
        let row: Option<IssueRow> = sqlx::query_as(&format!("{SELECT_ISSUE} WHERE {column} = ?"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("get_issue", format!("{column} {key}"), e))?;

        let row = row.ok_or_else(|| DomainError::not_found(EntityKind::Issue, not_found))?;
        self.load_details(vec![row])
            .await?
            .pop()
            .ok_or_else(|| DomainError::not_found(EntityKind::Issue, format!("{column} {key}")))
    }
}

#[async_trait]
impl IssueStore for SqliteStorage {
    async fn create_issue(&self, issue: &Issue) -> DomainResult<()> {
        validate_issue(issue)?;

        let mut tx = self.pool.begin().await.map_err(|e| transaction_error("create_issue", e))?;

        if row_exists(&mut tx, "issues", issue.id).await? {
            return Err(DomainError::already_exists(EntityKind::Issue, issue.id));
        }
        write_issue(&mut tx, issue, WriteMode::Insert).await?;

        tx.commit().await.map_err(|e| transaction_error("create_issue", e))?;
        Ok(())
    }

    async fn get_issue(&self, id: i64) -> DomainResult<IssueDetails> {
        self.get_issue_where("id", id, id.to_string()).await
    }

    async fn get_issue_by_number(&self, number: i32) -> DomainResult<IssueDetails> {
        self.get_issue_where("number", i64::from(number), format!("number {number}")).await
    }

    async fn upsert_issue(&self, issue: &Issue) -> DomainResult<()> {
        self.batch_upsert_issues(std::slice::from_ref(issue)).await
    }

    async fn delete_issue(&self, id: i64) -> DomainResult<()> {
        require_id(EntityKind::Issue, id)?;

        // Label and assignee links go with the row.
        let result = sqlx::query("DELETE FROM issues WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("delete_issue", id, e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(EntityKind::Issue, id));
        }

        Ok(())
    }

    async fn list_issues(&self, filter: IssueFilter) -> DomainResult<Vec<IssueDetails>> {
        let mut query = format!("{SELECT_ISSUE} WHERE 1=1");
        let mut bindings: Vec<&str> = Vec::new();

        if let Some(state) = filter.state.state() {
            query.push_str(" AND state = ?");
            bindings.push(state.as_str());
        }
        if let Some(label) = &filter.label {
            query.push_str(
                " AND EXISTS (SELECT 1 FROM issue_labels il JOIN labels l ON l.id = il.label_id \
                 WHERE il.issue_id = issues.id AND l.name = ?)",
            );
            bindings.push(label.as_str());
        }

        query.push_str(" ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?");

        let mut q = sqlx::query_as::<_, IssueRow>(&query);
        for binding in bindings {
            q = q.bind(binding);
        }

        let rows = q
            .bind(filter.page.sql_limit())
            .bind(i64::from(filter.page.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("list_issues", "*", e))?;

        self.load_details(rows).await
    }

    async fn batch_upsert_issues(&self, issues: &[Issue]) -> DomainResult<()> {
        if issues.is_empty() {
            return Ok(());
        }
        for issue in issues {
            validate_issue(issue)?;
        }

        // Dropping the transaction on an early return rolls everything back.
        let mut tx = self.pool.begin().await.map_err(|e| transaction_error("batch_upsert_issues", e))?;
        for issue in issues {
            write_issue(&mut tx, issue, WriteMode::Upsert).await?;
        }
        tx.commit().await.map_err(|e| transaction_error("batch_upsert_issues", e))?;

        tracing::debug!(count = issues.len(), "upserted issue batch");
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct IssueRow {
    id: i64,
    number: i32,
    title: String,
    body: String,
    state: String,
    comments: i32,
    html_url: String,
    locked: bool,
    created_at: String,
    updated_at: String,
    closed_at: Option<String>,
    user_id: Option<i64>,
    milestone_id: Option<i64>,
}

impl TryFrom<IssueRow> for Issue {
    type Error = DomainError;

    fn try_from(row: IssueRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            number: row.number,
            title: row.title,
            body: row.body,
            state: parse_state(&row.state)?,
            comments: row.comments,
            locked: row.locked,
            html_url: row.html_url,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
            closed_at: parse_optional_datetime(row.closed_at)?,
            creator_id: row.user_id,
            milestone_id: row.milestone_id,
            label_ids: Vec::new(),
            assignee_ids: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::{ItemState, StateFilter};
    use crate::domain::ports::{LabelStore, ListOptions, MilestoneStore, UserStore};
    use chrono::{Duration, TimeZone, Utc};

    async fn setup_test_store() -> SqliteStorage {
        SqliteStorage::new(create_migrated_test_pool().await.unwrap())
    }

    async fn count(store: &SqliteStorage, table: &str) -> i64 {
        let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(store.pool())
            .await
            .unwrap();
        n
    }

    #[tokio::test]
    async fn test_lookup_by_id_and_number() {
        let store = setup_test_store().await;
        store.upsert_issue(&Issue::new(500, 7, "Crash on start")).await.unwrap();

        let by_id = store.get_issue(500).await.unwrap();
        let by_number = store.get_issue_by_number(7).await.unwrap();
        assert_eq!(by_id, by_number);
        assert_eq!(by_id.issue.title, "Crash on start");

        let err = store.get_issue_by_number(999).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = setup_test_store().await;
        store.upsert_user(&User::new(1, "octocat")).await.unwrap();
        store.upsert_label(&Label::new(10, "bug", "d73a4a")).await.unwrap();
        let issue = Issue::new(500, 7, "Crash")
            .with_creator(1)
            .with_labels(vec![10])
            .with_assignees(vec![1]);

        store.upsert_issue(&issue).await.unwrap();
        let first = store.get_issue(500).await.unwrap();
        store.upsert_issue(&issue).await.unwrap();
        let second = store.get_issue(500).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(count(&store, "issues").await, 1);
        assert_eq!(count(&store, "issue_labels").await, 1);
        assert_eq!(count(&store, "issue_assignees").await, 1);
    }

    #[tokio::test]
    async fn test_missing_milestone_is_tolerated_then_linked() {
        let store = setup_test_store().await;
        let issue = Issue::new(500, 7, "Crash").with_milestone(3);

        store.upsert_issue(&issue).await.unwrap();
        let stored = store.get_issue(500).await.unwrap();
        assert_eq!(stored.issue.milestone_id, None);
        assert!(stored.milestone.is_none());

        store.upsert_milestone(&Milestone::new(3, 1, "v1.0")).await.unwrap();
        store.upsert_issue(&issue).await.unwrap();
        let stored = store.get_issue(500).await.unwrap();
        assert_eq!(stored.issue.milestone_id, Some(3));
        assert_eq!(stored.milestone.map(|m| m.title), Some("v1.0".to_string()));
    }

    #[tokio::test]
    async fn test_missing_creator_is_tolerated() {
        let store = setup_test_store().await;
        store.upsert_issue(&Issue::new(500, 7, "Crash").with_creator(42)).await.unwrap();

        let stored = store.get_issue(500).await.unwrap();
        assert_eq!(stored.issue.creator_id, None);
        assert!(stored.creator.is_none());
    }

    #[tokio::test]
    async fn test_reopen_clears_closed_at() {
        let store = setup_test_store().await;
        let closed_at = Utc.with_ymd_and_hms(2024, 2, 1, 9, 30, 0).unwrap();
        let closed = Issue::new(500, 7, "Crash").closed(closed_at);
        store.upsert_issue(&closed).await.unwrap();
        assert_eq!(store.get_issue(500).await.unwrap().issue.closed_at, Some(closed_at));

        let reopened = Issue {
            state: ItemState::Open,
            closed_at: None,
            ..closed
        };
        store.upsert_issue(&reopened).await.unwrap();

        let stored = store.get_issue(500).await.unwrap().issue;
        assert_eq!(stored.state, ItemState::Open);
        assert_eq!(stored.closed_at, None);
    }

    #[tokio::test]
    async fn test_batch_is_atomic_on_number_collision() {
        let store = setup_test_store().await;
        let batch = vec![
            Issue::new(1, 1, "first"),
            Issue::new(2, 2, "second"),
            Issue::new(3, 1, "duplicate number"),
        ];

        let err = store.batch_upsert_issues(&batch).await.unwrap_err();
        assert!(err.is_already_exists(), "got: {err}");
        assert_eq!(count(&store, "issues").await, 0);
    }

    #[tokio::test]
    async fn test_batch_with_unknown_label_rolls_back() {
        let store = setup_test_store().await;
        let batch = vec![
            Issue::new(1, 1, "first"),
            Issue::new(2, 2, "second").with_labels(vec![99]),
        ];

        assert!(store.batch_upsert_issues(&batch).await.is_err());
        assert_eq!(count(&store, "issues").await, 0);
    }

    #[tokio::test]
    async fn test_batch_rejects_invalid_issue_before_writing() {
        let store = setup_test_store().await;
        let batch = vec![Issue::new(1, 1, "ok"), Issue::new(2, 2, "")];

        let err = store.batch_upsert_issues(&batch).await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
        assert_eq!(count(&store, "issues").await, 0);
    }

    #[tokio::test]
    async fn test_links_are_additive() {
        let store = setup_test_store().await;
        for label in [Label::new(10, "bug", "d73a4a"), Label::new(11, "ui", "0e8a16")] {
            store.upsert_label(&label).await.unwrap();
        }

        store.upsert_issue(&Issue::new(500, 7, "Crash").with_labels(vec![10])).await.unwrap();
        store.upsert_issue(&Issue::new(500, 7, "Crash").with_labels(vec![11])).await.unwrap();

        let stored = store.get_issue(500).await.unwrap();
        assert_eq!(stored.issue.label_ids, vec![10, 11]);
        assert_eq!(stored.labels.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_keeps_created_at() {
        let store = setup_test_store().await;
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut issue = Issue::new(500, 7, "Crash");
        issue.created_at = created;
        store.upsert_issue(&issue).await.unwrap();

        issue.created_at = created + Duration::days(3);
        issue.title = "Crash on start".to_string();
        store.upsert_issue(&issue).await.unwrap();

        let stored = store.get_issue(500).await.unwrap().issue;
        assert_eq!(stored.created_at, created);
        assert_eq!(stored.title, "Crash on start");
    }

    #[tokio::test]
    async fn test_create_issue_conflicts() {
        let store = setup_test_store().await;
        store.create_issue(&Issue::new(500, 7, "Crash")).await.unwrap();

        let err = store.create_issue(&Issue::new(500, 8, "Other")).await.unwrap_err();
        assert!(err.is_already_exists());
        let err = store.create_issue(&Issue::new(501, 7, "Same number")).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_delete_user_clears_creator_and_assignment() {
        let store = setup_test_store().await;
        store.upsert_user(&User::new(1, "octocat")).await.unwrap();
        store
            .upsert_issue(&Issue::new(500, 7, "Crash").with_creator(1).with_assignees(vec![1]))
            .await
            .unwrap();

        store.delete_user(1).await.unwrap();

        let stored = store.get_issue(500).await.unwrap();
        assert_eq!(stored.issue.creator_id, None);
        assert!(stored.assignees.is_empty());
    }

    #[tokio::test]
    async fn test_delete_issue_removes_links() {
        let store = setup_test_store().await;
        store.upsert_label(&Label::new(10, "bug", "d73a4a")).await.unwrap();
        store.upsert_issue(&Issue::new(500, 7, "Crash").with_labels(vec![10])).await.unwrap();

        store.delete_issue(500).await.unwrap();

        assert!(store.get_issue(500).await.unwrap_err().is_not_found());
        assert_eq!(count(&store, "issue_labels").await, 0);
        assert!(store.delete_issue(500).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_issues_filters_and_orders() {
        let store = setup_test_store().await;
        store.upsert_label(&Label::new(10, "bug", "d73a4a")).await.unwrap();
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let mut older = Issue::new(1, 1, "older").with_labels(vec![10]);
        older.created_at = base;
        let mut newer = Issue::new(2, 2, "newer").with_labels(vec![10]);
        newer.created_at = base + Duration::hours(1);
        let closed = Issue::new(3, 3, "closed").closed(base);
        store.batch_upsert_issues(&[older, newer, closed]).await.unwrap();

        let open = store.list_issues(IssueFilter::default()).await.unwrap();
        let titles: Vec<_> = open.iter().map(|d| d.issue.title.as_str()).collect();
        assert_eq!(titles, vec!["newer", "older"]);

        let all = store.list_issues(IssueFilter::all()).await.unwrap();
        assert_eq!(all.len(), 3);

        let labelled = store
            .list_issues(IssueFilter {
                page: ListOptions::new(0, 1),
                state: StateFilter::All,
                label: Some("bug".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(labelled.len(), 1);
        assert_eq!(labelled[0].issue.id, 2);
    }
}
