//! Database query functions for the `calendars` table.

use anyhow::{Context, Result};
use sqlx::PgExecutor;

use crate::models::Calendar;

/// Name given to the calendar created at sign-up.
pub const DEFAULT_CALENDAR_NAME: &str = "My Calendar";

/// Insert a calendar owned by `owner_user_id`.
pub async fn insert_calendar<'e, E>(executor: E, owner_user_id: i64, name: &str) -> Result<Calendar>
where
    E: PgExecutor<'e>,
{
    let calendar = sqlx::query_as::<_, Calendar>(
        "INSERT INTO calendars (owner_user_id, name) VALUES ($1, $2) RETURNING *",
    )
    .bind(owner_user_id)
    .bind(name)
    .fetch_one(executor)
    .await
    .with_context(|| format!("failed to insert calendar for user {owner_user_id}"))?;

    Ok(calendar)
}

/// The user's primary calendar (the oldest one), if any.
pub async fn primary_calendar<'e, E>(executor: E, owner_user_id: i64) -> Result<Option<Calendar>>
where
    E: PgExecutor<'e>,
{
    let calendar = sqlx::query_as::<_, Calendar>(
        "SELECT * FROM calendars WHERE owner_user_id = $1 ORDER BY calendar_id ASC LIMIT 1",
    )
    .bind(owner_user_id)
    .fetch_optional(executor)
    .await
    .context("failed to fetch primary calendar")?;

    Ok(calendar)
}
