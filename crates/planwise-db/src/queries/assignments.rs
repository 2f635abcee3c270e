//! Database query functions for the `task_assignments` table.

use anyhow::{Context, Result};
use sqlx::PgExecutor;

use crate::models::TaskAssignment;

/// Share a task with a user.
///
/// Uses `ON CONFLICT DO NOTHING` so this is idempotent. Returns `true` when
/// a new assignment was created.
pub async fn assign_task<'e, E>(executor: E, task_id: i64, user_id: i64) -> Result<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "INSERT INTO task_assignments (task_id, user_id) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(task_id)
    .bind(user_id)
    .execute(executor)
    .await
    .with_context(|| format!("failed to assign task {task_id} to user {user_id}"))?;

    Ok(result.rows_affected() > 0)
}

/// List the assignments of a task, oldest first.
pub async fn list_assignments<'e, E>(executor: E, task_id: i64) -> Result<Vec<TaskAssignment>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, TaskAssignment>(
        "SELECT * FROM task_assignments WHERE task_id = $1 ORDER BY assigned_at ASC",
    )
    .bind(task_id)
    .fetch_all(executor)
    .await
    .context("failed to list task assignments")?;

    Ok(rows)
}
