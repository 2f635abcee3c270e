//! Database query functions for the `events` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgExecutor;

use crate::models::Event;

/// Parameters for inserting a new event row.
#[derive(Debug, Clone)]
pub struct NewEvent<'a> {
    pub calendar_id: i64,
    pub title: &'a str,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Insert a new event row.
pub async fn insert_event<'e, E>(executor: E, new: &NewEvent<'_>) -> Result<Event>
where
    E: PgExecutor<'e>,
{
    let event = sqlx::query_as::<_, Event>(
        "INSERT INTO events (calendar_id, title, start_time, end_time) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(new.calendar_id)
    .bind(new.title)
    .bind(new.start_time)
    .bind(new.end_time)
    .fetch_one(executor)
    .await
    .with_context(|| format!("failed to insert event {:?}", new.title))?;

    Ok(event)
}

/// List events across all of a user's calendars, ordered by start time.
pub async fn list_events_for_user<'e, E>(executor: E, owner_user_id: i64) -> Result<Vec<Event>>
where
    E: PgExecutor<'e>,
{
    let events = sqlx::query_as::<_, Event>(
        "SELECT e.* FROM events e \
         JOIN calendars c ON e.calendar_id = c.calendar_id \
         WHERE c.owner_user_id = $1 \
         ORDER BY e.start_time ASC, e.event_id ASC",
    )
    .bind(owner_user_id)
    .fetch_all(executor)
    .await
    .context("failed to list events for user")?;

    Ok(events)
}

/// Delete an event. Returns `false` when no such event.
pub async fn delete_event<'e, E>(executor: E, event_id: i64) -> Result<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM events WHERE event_id = $1")
        .bind(event_id)
        .execute(executor)
        .await
        .context("failed to delete event")?;

    Ok(result.rows_affected() > 0)
}
