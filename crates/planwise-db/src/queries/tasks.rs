//! Database query functions for the `tasks` table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{PgExecutor, PgPool};

use crate::models::{Priority, Task, TaskStatus, TaskWithRole};

/// Parameters for inserting a new task row.
#[derive(Debug, Clone)]
pub struct NewTask<'a> {
    pub owner_user_id: i64,
    pub title: &'a str,
    pub parent_task_id: Option<i64>,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
}

impl<'a> NewTask<'a> {
    /// A top-level, medium-priority task with no due date.
    pub fn new(owner_user_id: i64, title: &'a str) -> Self {
        Self {
            owner_user_id,
            title,
            parent_task_id: None,
            priority: Priority::default(),
            due_date: None,
        }
    }
}

/// Insert a new task row. Status starts as `todo`.
pub async fn insert_task<'e, E>(executor: E, new: &NewTask<'_>) -> Result<Task>
where
    E: PgExecutor<'e>,
{
    let task = sqlx::query_as::<_, Task>(
        "INSERT INTO tasks (owner_user_id, title, parent_task_id, priority, due_date) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(new.owner_user_id)
    .bind(new.title)
    .bind(new.parent_task_id)
    .bind(new.priority)
    .bind(new.due_date)
    .fetch_one(executor)
    .await
    .with_context(|| format!("failed to insert task {:?}", new.title))?;

    Ok(task)
}

/// Fetch a single task by ID.
pub async fn get_task<'e, E>(executor: E, task_id: i64) -> Result<Option<Task>>
where
    E: PgExecutor<'e>,
{
    let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE task_id = $1")
        .bind(task_id)
        .fetch_optional(executor)
        .await
        .context("failed to fetch task")?;

    Ok(task)
}

/// List every task visible to a user: the ones they own plus the ones shared
/// with them. Parents come first, each followed by its subtasks in creation
/// order.
pub async fn list_tasks_for_user<'e, E>(executor: E, user_id: i64) -> Result<Vec<TaskWithRole>>
where
    E: PgExecutor<'e>,
{
    let tasks = sqlx::query_as::<_, TaskWithRole>(
        "SELECT * FROM ( \
             SELECT t.*, 'owner'::text AS role, \
                    (SELECT COUNT(*) FROM task_assignments a WHERE a.task_id = t.task_id) AS assignment_count \
             FROM tasks t \
             WHERE t.owner_user_id = $1 \
             UNION ALL \
             SELECT t.*, 'assignee'::text AS role, \
                    (SELECT COUNT(*) FROM task_assignments a2 WHERE a2.task_id = t.task_id) AS assignment_count \
             FROM tasks t \
             JOIN task_assignments a ON a.task_id = t.task_id \
             WHERE a.user_id = $1 AND t.owner_user_id <> $1 \
         ) AS visible \
         ORDER BY COALESCE(parent_task_id, task_id), (parent_task_id IS NOT NULL), created_at ASC, task_id ASC",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .context("failed to list tasks for user")?;

    Ok(tasks)
}

/// List the subtasks of a parent, oldest first.
pub async fn list_subtasks<'e, E>(executor: E, parent_task_id: i64) -> Result<Vec<Task>>
where
    E: PgExecutor<'e>,
{
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE parent_task_id = $1 ORDER BY created_at ASC, task_id ASC",
    )
    .bind(parent_task_id)
    .fetch_all(executor)
    .await
    .context("failed to list subtasks")?;

    Ok(tasks)
}

/// List the user's own tasks that are still `todo`.
pub async fn list_open_tasks<'e, E>(executor: E, owner_user_id: i64) -> Result<Vec<Task>>
where
    E: PgExecutor<'e>,
{
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks \
         WHERE owner_user_id = $1 AND status = 'todo' \
         ORDER BY created_at ASC, task_id ASC",
    )
    .bind(owner_user_id)
    .fetch_all(executor)
    .await
    .context("failed to list open tasks")?;

    Ok(tasks)
}

/// Update the status of a task, stamping `completed_at` when it moves to
/// `done` and clearing it otherwise. Returns `false` when no such task.
pub async fn update_task_status<'e, E>(executor: E, task_id: i64, status: TaskStatus) -> Result<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE tasks \
         SET status = $1, \
             completed_at = CASE WHEN $1 = 'done' THEN COALESCE(completed_at, now()) ELSE NULL END \
         WHERE task_id = $2",
    )
    .bind(status)
    .bind(task_id)
    .execute(executor)
    .await
    .context("failed to update task status")?;

    Ok(result.rows_affected() > 0)
}

/// Set the priority of one of the owner's tasks. Returns rows affected
/// (0 when the task does not exist or belongs to someone else).
pub async fn update_task_priority<'e, E>(
    executor: E,
    task_id: i64,
    owner_user_id: i64,
    priority: Priority,
) -> Result<u64>
where
    E: PgExecutor<'e>,
{
    let result =
        sqlx::query("UPDATE tasks SET priority = $1 WHERE task_id = $2 AND owner_user_id = $3")
            .bind(priority)
            .bind(task_id)
            .bind(owner_user_id)
            .execute(executor)
            .await
            .with_context(|| format!("failed to update priority of task {task_id}"))?;

    Ok(result.rows_affected())
}

/// Delete a task together with its subtasks in one transaction.
///
/// Returns `false` (and changes nothing) when the task does not exist.
pub async fn delete_task_tree(pool: &PgPool, task_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    sqlx::query("DELETE FROM tasks WHERE parent_task_id = $1")
        .bind(task_id)
        .execute(&mut *tx)
        .await
        .context("failed to delete subtasks")?;

    let result = sqlx::query("DELETE FROM tasks WHERE task_id = $1")
        .bind(task_id)
        .execute(&mut *tx)
        .await
        .context("failed to delete task")?;

    if result.rows_affected() == 0 {
        tx.rollback().await.context("failed to roll back transaction")?;
        return Ok(false);
    }

    tx.commit().await.context("failed to commit transaction")?;
    Ok(true)
}

/// Total and completed counts over a user's own tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionCounts {
    pub total: i64,
    pub completed: i64,
}

/// Count the user's tasks and how many of them are done.
pub async fn completion_counts<'e, E>(executor: E, owner_user_id: i64) -> Result<CompletionCounts>
where
    E: PgExecutor<'e>,
{
    let (total, completed): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'done') \
         FROM tasks WHERE owner_user_id = $1",
    )
    .bind(owner_user_id)
    .fetch_one(executor)
    .await
    .context("failed to count tasks")?;

    Ok(CompletionCounts { total, completed })
}

/// Distinct UTC calendar days on which the user completed at least one task,
/// most recent first.
pub async fn completion_days<'e, E>(executor: E, owner_user_id: i64) -> Result<Vec<NaiveDate>>
where
    E: PgExecutor<'e>,
{
    let rows: Vec<(NaiveDate,)> = sqlx::query_as(
        "SELECT DISTINCT (completed_at AT TIME ZONE 'UTC')::date AS day \
         FROM tasks \
         WHERE owner_user_id = $1 AND status = 'done' AND completed_at IS NOT NULL \
         ORDER BY day DESC",
    )
    .bind(owner_user_id)
    .fetch_all(executor)
    .await
    .context("failed to list completion days")?;

    Ok(rows.into_iter().map(|(day,)| day).collect())
}
