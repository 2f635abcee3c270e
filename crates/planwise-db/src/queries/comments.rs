//! Database query functions for the `task_comments` table.

use anyhow::{Context, Result};
use sqlx::PgExecutor;

use crate::models::TaskComment;

/// Insert a comment and return it joined with the author's name.
pub async fn insert_comment<'e, E>(
    executor: E,
    task_id: i64,
    user_id: i64,
    text: &str,
) -> Result<TaskComment>
where
    E: PgExecutor<'e>,
{
    let comment = sqlx::query_as::<_, TaskComment>(
        "WITH inserted AS ( \
             INSERT INTO task_comments (task_id, user_id, comment_text) \
             VALUES ($1, $2, $3) \
             RETURNING * \
         ) \
         SELECT i.comment_id, i.task_id, i.user_id, u.full_name, i.comment_text, i.created_at \
         FROM inserted i JOIN users u ON u.user_id = i.user_id",
    )
    .bind(task_id)
    .bind(user_id)
    .bind(text)
    .fetch_one(executor)
    .await
    .with_context(|| format!("failed to insert comment on task {task_id}"))?;

    Ok(comment)
}

/// List a task's comments with author names, oldest first.
pub async fn list_comments_for_task<'e, E>(executor: E, task_id: i64) -> Result<Vec<TaskComment>>
where
    E: PgExecutor<'e>,
{
    let comments = sqlx::query_as::<_, TaskComment>(
        "SELECT c.comment_id, c.task_id, c.user_id, u.full_name, c.comment_text, c.created_at \
         FROM task_comments c \
         JOIN users u ON u.user_id = c.user_id \
         WHERE c.task_id = $1 \
         ORDER BY c.created_at ASC, c.comment_id ASC",
    )
    .bind(task_id)
    .fetch_all(executor)
    .await
    .context("failed to list comments for task")?;

    Ok(comments)
}
