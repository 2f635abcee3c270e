//! Database query functions for the `task_reminders` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgExecutor;

use crate::models::{DueReminder, Reminder};

/// Schedule a pending reminder for a task.
pub async fn insert_reminder<'e, E>(
    executor: E,
    task_id: i64,
    remind_at: DateTime<Utc>,
) -> Result<Reminder>
where
    E: PgExecutor<'e>,
{
    let reminder = sqlx::query_as::<_, Reminder>(
        "INSERT INTO task_reminders (task_id, remind_at) VALUES ($1, $2) RETURNING *",
    )
    .bind(task_id)
    .bind(remind_at)
    .fetch_one(executor)
    .await
    .with_context(|| format!("failed to insert reminder for task {task_id}"))?;

    Ok(reminder)
}

/// Pending reminders due at or before `now` on tasks the user owns or has
/// been assigned, oldest first.
pub async fn list_due_reminders<'e, E>(
    executor: E,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<DueReminder>>
where
    E: PgExecutor<'e>,
{
    let reminders = sqlx::query_as::<_, DueReminder>(
        "SELECT r.reminder_id, r.task_id, t.title, r.remind_at \
         FROM task_reminders r \
         JOIN tasks t ON t.task_id = r.task_id \
         WHERE r.status = 'pending' \
           AND r.remind_at <= $2 \
           AND (t.owner_user_id = $1 \
                OR EXISTS (SELECT 1 FROM task_assignments a \
                           WHERE a.task_id = t.task_id AND a.user_id = $1)) \
         ORDER BY r.remind_at ASC, r.reminder_id ASC",
    )
    .bind(user_id)
    .bind(now)
    .fetch_all(executor)
    .await
    .context("failed to list due reminders")?;

    Ok(reminders)
}

/// Mark reminders as sent. Already-sent IDs are left untouched. Returns the
/// number of reminders that changed state.
pub async fn acknowledge_reminders<'e, E>(executor: E, reminder_ids: &[i64]) -> Result<u64>
where
    E: PgExecutor<'e>,
{
    if reminder_ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        "UPDATE task_reminders SET status = 'sent' \
         WHERE reminder_id = ANY($1) AND status = 'pending'",
    )
    .bind(reminder_ids)
    .execute(executor)
    .await
    .context("failed to acknowledge reminders")?;

    Ok(result.rows_affected())
}
