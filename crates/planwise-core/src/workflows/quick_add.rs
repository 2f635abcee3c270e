//! Quick-add: turn a free-text note into calendar events and tasks.

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use planwise_db::models::{Event, Task};
use planwise_db::queries::{calendars, events, tasks};

use super::payload::{self, PayloadError, QuickAddPayload};
use super::{Stage, WorkflowError, required_id, required_text, rolled_back};
use crate::llm::CompletionClient;

pub const NOTHING_FOUND_MESSAGE: &str = "No events or tasks found in text.";
pub const SUCCESS_MESSAGE: &str = "Successfully added items!";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickAddRequest {
    pub text: Option<String>,
    #[serde(alias = "user_id")]
    pub user_id: Option<i64>,
    /// IANA zone name of the caller, e.g. `Europe/Berlin`.
    pub time_zone: Option<String>,
    /// The caller's wall-clock time as they would read it, e.g.
    /// `Tuesday, October 21, 2025 at 2:05 PM`.
    pub local_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreatedItems {
    pub events: Vec<Event>,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuickAddOutcome {
    pub message: String,
    /// Model that produced the parse.
    pub model: String,
    pub created: CreatedItems,
    /// Extracted items dropped as malformed.
    pub skipped: usize,
}

fn build_prompt(text: &str, time_zone: &str, local_time: Option<&str>, now: DateTime<Utc>) -> String {
    let iso_now = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    let local_line = match local_time {
        Some(local) => format!("Their current local time is: {local}"),
        None => "Their current local time was not supplied; derive it from the UTC time below and their timezone.".to_string(),
    };

    format!(
        r#"You are a task-parsing assistant. Analyze the user's text and return ONLY a valid JSON object.
Do not include markdown tags.

The JSON object must have keys "events" and "tasks".
- "events": Array of objects. Each MUST have "title" (Title Case), "startTimeUtc" (an exact ISO 8601 UTC string that must end with 'Z', e.g. "2025-10-22T19:30:00.000Z"), and "durationMinutes" (number). If a duration is not mentioned, default to 60.
- "tasks": Array of objects. Each MUST have "title" (Title Case).
- Return empty arrays if no events or tasks are found.

DATE CONTEXT: The user is in the "{time_zone}" timezone.
{local_line}
The current UTC time is: {iso_now}
Use this context for all relative terms like "tomorrow", "next week", "at 7:30 pm".

Example (assuming the current time is Oct 21, 2025 in America/New_York):
User text: "Meet Sam next Tuesday at 2pm for 1 hour and remind me to prep docs"
Your JSON:
{{ "events": [ {{ "title": "Meet Sam", "startTimeUtc": "2025-10-28T18:00:00.000Z", "durationMinutes": 60 }} ], "tasks": [ {{ "title": "Prep Docs" }} ] }}

Now, parse this text: "{text}""#
    )
}

/// Parse `request.text` with the model and store the extracted events (on
/// the caller's first calendar) and tasks in one transaction.
///
/// `now` anchors relative dates in the prompt; `default_time_zone` is used
/// when the request names none.
pub async fn quick_add(
    pool: &PgPool,
    client: &CompletionClient,
    request: &QuickAddRequest,
    now: DateTime<Utc>,
    default_time_zone: &str,
) -> Result<QuickAddOutcome, WorkflowError> {
    let text = required_text("text", request.text.as_deref())?;
    let user_id = required_id("userId", request.user_id)?;
    let time_zone = request
        .time_zone
        .as_deref()
        .map(str::trim)
        .filter(|tz| !tz.is_empty())
        .unwrap_or(default_time_zone);
    debug!(workflow = "quick_add", user_id, stage = %Stage::Received);

    let calendar = calendars::primary_calendar(pool, user_id)
        .await?
        .ok_or_else(|| WorkflowError::NotFound("User calendar not found.".to_string()))?;

    debug!(workflow = "quick_add", stage = %Stage::Prompting);
    let prompt = build_prompt(text, time_zone, request.local_time.as_deref(), now);
    let completion = client.complete(&prompt).await?;

    debug!(workflow = "quick_add", stage = %Stage::Parsing, model = %completion.model);
    let QuickAddPayload {
        events: event_drafts,
        tasks: task_drafts,
        dropped,
    } = payload::parse_quick_add(&completion.text)?;
    if dropped > 0 {
        warn!(workflow = "quick_add", dropped, "discarded malformed items");
    }

    if event_drafts.is_empty() && task_drafts.is_empty() {
        if dropped > 0 {
            return Err(PayloadError::NoUsableItems {
                key: "events/tasks",
                dropped,
            }
            .into());
        }
        return Ok(QuickAddOutcome {
            message: NOTHING_FOUND_MESSAGE.to_string(),
            model: completion.model,
            created: CreatedItems::default(),
            skipped: 0,
        });
    }

    debug!(workflow = "quick_add", stage = %Stage::Persisting);
    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let mut created = CreatedItems::default();

    for draft in &event_drafts {
        let new = events::NewEvent {
            calendar_id: calendar.calendar_id,
            title: &draft.title,
            start_time: draft.start_time,
            end_time: draft.end_time(),
        };
        created.events.push(
            events::insert_event(&mut *tx, &new)
                .await
                .map_err(rolled_back("quick_add"))?,
        );
    }
    for draft in &task_drafts {
        let new = tasks::NewTask::new(user_id, &draft.title);
        created.tasks.push(
            tasks::insert_task(&mut *tx, &new)
                .await
                .map_err(rolled_back("quick_add"))?,
        );
    }

    tx.commit().await.context("failed to commit transaction")?;
    info!(
        workflow = "quick_add",
        stage = %Stage::Committed,
        user_id,
        model = %completion.model,
        events = created.events.len(),
        tasks = created.tasks.len(),
        "quick-add stored"
    );

    Ok(QuickAddOutcome {
        message: SUCCESS_MESSAGE.to_string(),
        model: completion.model,
        created,
        skipped: dropped,
    })
}
