//! Task repository
//!
//! Every method takes an [`OwnerScope`] and adds `user_id = ?` to its
//! statement, so rows belonging to other users are never read, changed or
//! removed through this interface.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{timestamp_now, StatusFilter, Task, TaskData, TaskFilter, TaskStatus};
use crate::services::context::OwnerScope;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row, Sqlite, SqlitePool};
use std::sync::Arc;

const TASK_COLUMNS: &str =
    "id, user_id, title, description, status, created_at, updated_at";

/// Task repository trait
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// List the owner's tasks matching `filter`, newest first
    async fn find_many(&self, scope: &OwnerScope, filter: &TaskFilter) -> Result<Vec<Task>>;

    /// Get one of the owner's tasks by id
    async fn find_first(&self, scope: &OwnerScope, id: &str) -> Result<Option<Task>>;

    /// Insert a new task owned by `scope`
    async fn create(&self, scope: &OwnerScope, data: &TaskData) -> Result<Task>;

    /// Replace the fields of one of the owner's tasks.
    ///
    /// Returns `None` when no row matched `(id, owner)`.
    async fn update(&self, scope: &OwnerScope, id: &str, data: &TaskData)
        -> Result<Option<Task>>;

    /// Delete the owner's task with `id`, returning the number of rows removed
    async fn delete_many(&self, scope: &OwnerScope, id: &str) -> Result<u64>;

    /// Count the owner's tasks
    async fn count(&self, scope: &OwnerScope) -> Result<i64>;
}

/// SQLx-based task repository implementation
pub struct SqlxTaskRepository {
    pool: DynDatabasePool,
}

impl SqlxTaskRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TaskRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TaskRepository for SqlxTaskRepository {
    async fn find_many(&self, scope: &OwnerScope, filter: &TaskFilter) -> Result<Vec<Task>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => find_tasks_sqlite(pool, scope, filter).await,
            Backend::Mysql(pool) => find_tasks_mysql(pool, scope, filter).await,
        }
    }

    async fn find_first(&self, scope: &OwnerScope, id: &str) -> Result<Option<Task>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => find_task_sqlite(pool, scope, id).await,
            Backend::Mysql(pool) => find_task_mysql(pool, scope, id).await,
        }
    }

    async fn create(&self, scope: &OwnerScope, data: &TaskData) -> Result<Task> {
        let task = Task::new(scope.user_id(), data.clone());
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_task_sqlite(pool, &task).await,
            Backend::Mysql(pool) => create_task_mysql(pool, &task).await,
        }
    }

    async fn update(
        &self,
        scope: &OwnerScope,
        id: &str,
        data: &TaskData,
    ) -> Result<Option<Task>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                if update_task_sqlite(pool, scope, id, data).await? == 0 {
                    return Ok(None);
                }
                find_task_sqlite(pool, scope, id).await
            }
            Backend::Mysql(pool) => {
                if update_task_mysql(pool, scope, id, data).await? == 0 {
                    return Ok(None);
                }
                find_task_mysql(pool, scope, id).await
            }
        }
    }

    async fn delete_many(&self, scope: &OwnerScope, id: &str) -> Result<u64> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => delete_task_sqlite(pool, scope, id).await,
            Backend::Mysql(pool) => delete_task_mysql(pool, scope, id).await,
        }
    }

    async fn count(&self, scope: &OwnerScope) -> Result<i64> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => count_tasks_sqlite(pool, scope).await,
            Backend::Mysql(pool) => count_tasks_mysql(pool, scope).await,
        }
    }
}

fn parse_status(raw: &str) -> Result<TaskStatus> {
    raw.parse()
        .with_context(|| format!("Unexpected task status in database: {}", raw))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn find_tasks_sqlite(
    pool: &SqlitePool,
    scope: &OwnerScope,
    filter: &TaskFilter,
) -> Result<Vec<Task>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM tasks WHERE user_id = ",
        TASK_COLUMNS
    ));
    qb.push_bind(scope.user_id());

    if let StatusFilter::Only(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }

    // instr() is case-sensitive, unlike LIKE
    if let Some(query) = filter.query.as_deref() {
        qb.push(" AND (instr(title, ")
            .push_bind(query.to_string())
            .push(") > 0 OR instr(description, ")
            .push_bind(query.to_string())
            .push(") > 0)");
    }

    qb.push(" ORDER BY created_at DESC");

    let rows = qb
        .build()
        .fetch_all(pool)
        .await
        .context("Failed to list tasks")?;

    rows.iter().map(row_to_task_sqlite).collect()
}

async fn find_task_sqlite(pool: &SqlitePool, scope: &OwnerScope, id: &str) -> Result<Option<Task>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM tasks WHERE id = ? AND user_id = ?",
        TASK_COLUMNS
    ))
    .bind(id)
    .bind(scope.user_id())
    .fetch_optional(pool)
    .await
    .context("Failed to get task by ID")?;

    row.as_ref().map(row_to_task_sqlite).transpose()
}

async fn create_task_sqlite(pool: &SqlitePool, task: &Task) -> Result<Task> {
    sqlx::query(
        r#"
        INSERT INTO tasks (id, user_id, title, description, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&task.id)
    .bind(task.user_id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status.as_str())
    .bind(task.created_at)
    .bind(task.updated_at)
    .execute(pool)
    .await
    .context("Failed to create task")?;

    Ok(task.clone())
}

async fn update_task_sqlite(
    pool: &SqlitePool,
    scope: &OwnerScope,
    id: &str,
    data: &TaskData,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET title = ?, description = ?, status = ?, updated_at = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(&data.title)
    .bind(&data.description)
    .bind(data.status.as_str())
    .bind(timestamp_now())
    .bind(id)
    .bind(scope.user_id())
    .execute(pool)
    .await
    .context("Failed to update task")?;

    Ok(result.rows_affected())
}

async fn delete_task_sqlite(pool: &SqlitePool, scope: &OwnerScope, id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(scope.user_id())
        .execute(pool)
        .await
        .context("Failed to delete task")?;

    Ok(result.rows_affected())
}

async fn count_tasks_sqlite(pool: &SqlitePool, scope: &OwnerScope) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM tasks WHERE user_id = ?")
        .bind(scope.user_id())
        .fetch_one(pool)
        .await
        .context("Failed to count tasks")?;

    Ok(row.get("count"))
}

fn row_to_task_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Task> {
    let status: String = row.get("status");
    Ok(Task {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        status: parse_status(&status)?,
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn find_tasks_mysql(
    pool: &MySqlPool,
    scope: &OwnerScope,
    filter: &TaskFilter,
) -> Result<Vec<Task>> {
    let mut qb = QueryBuilder::<MySql>::new(format!(
        "SELECT {} FROM tasks WHERE user_id = ",
        TASK_COLUMNS
    ));
    qb.push_bind(scope.user_id());

    if let StatusFilter::Only(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }

    // Binary comparison keeps the match case-sensitive under any collation
    if let Some(query) = filter.query.as_deref() {
        qb.push(" AND (INSTR(CAST(title AS BINARY), CAST(")
            .push_bind(query.to_string())
            .push(" AS BINARY)) > 0 OR INSTR(CAST(description AS BINARY), CAST(")
            .push_bind(query.to_string())
            .push(" AS BINARY)) > 0)");
    }

    qb.push(" ORDER BY created_at DESC");

    let rows = qb
        .build()
        .fetch_all(pool)
        .await
        .context("Failed to list tasks")?;

    rows.iter().map(row_to_task_mysql).collect()
}

async fn find_task_mysql(pool: &MySqlPool, scope: &OwnerScope, id: &str) -> Result<Option<Task>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM tasks WHERE id = ? AND user_id = ?",
        TASK_COLUMNS
    ))
    .bind(id)
    .bind(scope.user_id())
    .fetch_optional(pool)
    .await
    .context("Failed to get task by ID")?;

    row.as_ref().map(row_to_task_mysql).transpose()
}

async fn create_task_mysql(pool: &MySqlPool, task: &Task) -> Result<Task> {
    sqlx::query(
        r#"
        INSERT INTO tasks (id, user_id, title, description, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&task.id)
    .bind(task.user_id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status.as_str())
    .bind(task.created_at)
    .bind(task.updated_at)
    .execute(pool)
    .await
    .context("Failed to create task")?;

    Ok(task.clone())
}

async fn update_task_mysql(
    pool: &MySqlPool,
    scope: &OwnerScope,
    id: &str,
    data: &TaskData,
) -> Result<u64> {
    // updated_at always changes, so affected rows equals matched rows
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET title = ?, description = ?, status = ?, updated_at = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(&data.title)
    .bind(&data.description)
    .bind(data.status.as_str())
    .bind(timestamp_now())
    .bind(id)
    .bind(scope.user_id())
    .execute(pool)
    .await
    .context("Failed to update task")?;

    Ok(result.rows_affected())
}

async fn delete_task_mysql(pool: &MySqlPool, scope: &OwnerScope, id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(scope.user_id())
        .execute(pool)
        .await
        .context("Failed to delete task")?;

    Ok(result.rows_affected())
}

async fn count_tasks_mysql(pool: &MySqlPool, scope: &OwnerScope) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM tasks WHERE user_id = ?")
        .bind(scope.user_id())
        .fetch_one(pool)
        .await
        .context("Failed to count tasks")?;

    Ok(row.get("count"))
}

fn row_to_task_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Task> {
    let status: String = row.get("status");
    Ok(Task {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        status: parse_status(&status)?,
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::User;
    use crate::services::context::Caller;
    use std::time::Duration;

    async fn setup() -> (DynDatabasePool, SqlxTaskRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        (pool.clone(), SqlxTaskRepository::new(pool))
    }

    async fn owner(pool: &DynDatabasePool, email: &str) -> OwnerScope {
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new(
                email.to_string(),
                "owner".to_string(),
                "hash".to_string(),
            ))
            .await
            .expect("Failed to create user");
        Caller::for_user(user.id).scope()
    }

    fn data(title: &str, description: &str, status: TaskStatus) -> TaskData {
        TaskData {
            title: title.to_string(),
            description: description.to_string(),
            status,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_first() {
        let (pool, repo) = setup().await;
        let alice = owner(&pool, "alice@example.com").await;

        let created = repo
            .create(&alice, &data("Buy milk", "2 liters", TaskStatus::Todo))
            .await
            .expect("Failed to create task");

        assert_eq!(created.user_id, alice.user_id());

        let found = repo
            .find_first(&alice, &created.id)
            .await
            .unwrap()
            .expect("Task not found");
        assert_eq!(found.id, created.id);
        assert_eq!(found.title, "Buy milk");
        assert_eq!(found.status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn test_other_owner_cannot_see_update_or_delete() {
        let (pool, repo) = setup().await;
        let alice = owner(&pool, "alice@example.com").await;
        let bob = owner(&pool, "bob@example.com").await;

        let task = repo
            .create(&alice, &data("Secret", "alice only", TaskStatus::Todo))
            .await
            .unwrap();

        assert!(repo.find_first(&bob, &task.id).await.unwrap().is_none());
        assert!(repo
            .find_many(&bob, &TaskFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert!(repo
            .update(&bob, &task.id, &data("Hijacked", "x", TaskStatus::Done))
            .await
            .unwrap()
            .is_none());
        assert_eq!(repo.delete_many(&bob, &task.id).await.unwrap(), 0);

        let unchanged = repo.find_first(&alice, &task.id).await.unwrap().unwrap();
        assert_eq!(unchanged, task);
    }

    #[tokio::test]
    async fn test_find_many_orders_newest_first() {
        let (pool, repo) = setup().await;
        let alice = owner(&pool, "alice@example.com").await;

        let mut ids = Vec::new();
        for title in ["first", "second", "third"] {
            let task = repo
                .create(&alice, &data(title, "d", TaskStatus::Todo))
                .await
                .unwrap();
            ids.push(task.id);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let listed: Vec<String> = repo
            .find_many(&alice, &TaskFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();

        ids.reverse();
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn test_find_many_filters_by_status_and_text() {
        let (pool, repo) = setup().await;
        let alice = owner(&pool, "alice@example.com").await;

        repo.create(&alice, &data("Write report", "quarterly", TaskStatus::Done))
            .await
            .unwrap();
        repo.create(&alice, &data("Call Bob", "about the Report", TaskStatus::Todo))
            .await
            .unwrap();
        repo.create(&alice, &data("Groceries", "milk", TaskStatus::InProgress))
            .await
            .unwrap();

        let done = repo
            .find_many(
                &alice,
                &TaskFilter {
                    query: None,
                    status: StatusFilter::Only(TaskStatus::Done),
                },
            )
            .await
            .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].title, "Write report");

        let lower = repo
            .find_many(
                &alice,
                &TaskFilter {
                    query: Some("report".to_string()),
                    status: StatusFilter::All,
                },
            )
            .await
            .unwrap();
        assert_eq!(lower.len(), 1, "Text match should be case-sensitive");
        assert_eq!(lower[0].title, "Write report");

        let upper = repo
            .find_many(
                &alice,
                &TaskFilter {
                    query: Some("Report".to_string()),
                    status: StatusFilter::Only(TaskStatus::Todo),
                },
            )
            .await
            .unwrap();
        assert_eq!(upper.len(), 1);
        assert_eq!(upper[0].title, "Call Bob");

        let everything = repo
            .find_many(
                &alice,
                &TaskFilter {
                    query: None,
                    status: StatusFilter::All,
                },
            )
            .await
            .unwrap();
        assert_eq!(everything.len(), 3);
    }

    #[tokio::test]
    async fn test_update_replaces_fields_and_bumps_updated_at() {
        let (pool, repo) = setup().await;
        let alice = owner(&pool, "alice@example.com").await;

        let task = repo
            .create(&alice, &data("Draft", "v1", TaskStatus::Todo))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let updated = repo
            .update(&alice, &task.id, &data("Final", "v2", TaskStatus::Done))
            .await
            .unwrap()
            .expect("Task should be updated");

        assert_eq!(updated.id, task.id);
        assert_eq!(updated.title, "Final");
        assert_eq!(updated.description, "v2");
        assert_eq!(updated.status, TaskStatus::Done);
        assert_eq!(updated.created_at, task.created_at);
        assert!(updated.updated_at > task.updated_at);
    }

    #[tokio::test]
    async fn test_delete_many_and_count() {
        let (pool, repo) = setup().await;
        let alice = owner(&pool, "alice@example.com").await;

        let task = repo
            .create(&alice, &data("t", "d", TaskStatus::Todo))
            .await
            .unwrap();
        assert_eq!(repo.count(&alice).await.unwrap(), 1);

        assert_eq!(repo.delete_many(&alice, &task.id).await.unwrap(), 1);
        assert_eq!(repo.delete_many(&alice, &task.id).await.unwrap(), 0);
        assert_eq!(repo.count(&alice).await.unwrap(), 0);
    }
}
