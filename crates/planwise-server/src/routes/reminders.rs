//! Reminders are polled: clients ask which are due, show them, and
//! acknowledge the ones they displayed.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use planwise_db::models::{DueReminder, Reminder};
use planwise_db::queries::{reminders, tasks};

use super::{UserQuery, parse_instant, present};
use crate::serve_cmd::{AppError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReminderBody {
    pub remind_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeBody {
    #[serde(default)]
    pub reminder_ids: Vec<i64>,
}

pub async fn create_reminder(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<CreateReminderBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Reminder>), AppError> {
    let Path(task_id) = path?;
    let Json(body) = body?;
    let raw = present(body.remind_at.as_deref())
        .ok_or_else(|| AppError::bad_request("remindAt is required."))?;
    let remind_at = parse_instant("remindAt", raw)?;

    if tasks::get_task(&state.pool, task_id)
        .await
        .map_err(AppError::internal)?
        .is_none()
    {
        return Err(AppError::not_found("Task not found."));
    }

    let reminder = reminders::insert_reminder(&state.pool, task_id, remind_at)
        .await
        .map_err(AppError::internal)?;
    Ok((StatusCode::CREATED, Json(reminder)))
}

pub async fn check_reminders(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<Vec<DueReminder>>, AppError> {
    let Query(query) = query?;
    let user_id = query.require()?;
    let due = reminders::list_due_reminders(&state.pool, user_id, Utc::now())
        .await
        .map_err(AppError::internal)?;
    Ok(Json(due))
}

pub async fn acknowledge(
    State(state): State<AppState>,
    body: Result<Json<AcknowledgeBody>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body?;
    let acknowledged = reminders::acknowledge_reminders(&state.pool, &body.reminder_ids)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(json!({ "acknowledged": acknowledged })))
}
