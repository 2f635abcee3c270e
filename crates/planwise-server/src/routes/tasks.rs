use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};

use planwise_db::models::{Priority, TaskStatus, TaskWithRole};
use planwise_db::queries::tasks::{self, NewTask};

use super::{UserQuery, present};
use crate::serve_cmd::{AppError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskBody {
    pub title: Option<String>,
    #[serde(alias = "owner_user_id")]
    pub user_id: Option<i64>,
    pub priority: Option<String>,
    /// `YYYY-MM-DD`; blank means none.
    pub due_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskBody {
    pub status: Option<String>,
}

fn parse_priority(raw: Option<&str>) -> Result<Priority, AppError> {
    match present(raw) {
        None => Ok(Priority::default()),
        Some(p) => p.parse::<Priority>().map_err(|e| AppError::bad_request(format!("{e}"))),
    }
}

fn parse_due_date(raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    present(raw)
        .map(|d| {
            NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map_err(|_| AppError::bad_request(format!("dueDate must be YYYY-MM-DD, got {d:?}")))
        })
        .transpose()
}

pub async fn create_task(
    State(state): State<AppState>,
    body: Result<Json<CreateTaskBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(body) = body?;
    let (Some(title), Some(user_id)) = (present(body.title.as_deref()), body.user_id) else {
        return Err(AppError::bad_request("Task title and user ID are required."));
    };

    let new = NewTask {
        priority: parse_priority(body.priority.as_deref())?,
        due_date: parse_due_date(body.due_date.as_deref())?,
        ..NewTask::new(user_id, title)
    };
    let task = tasks::insert_task(&state.pool, &new)
        .await
        .map_err(AppError::internal)?;
    tracing::info!(task_id = task.task_id, user_id, "task created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Task created successfully!", "task": task })),
    ))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<Vec<TaskWithRole>>, AppError> {
    let Query(query) = query?;
    let user_id = query.require()?;
    let rows = tasks::list_tasks_for_user(&state.pool, user_id)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(rows))
}

pub async fn update_task(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateTaskBody>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(task_id) = path?;
    let Json(body) = body?;
    let status = present(body.status.as_deref())
        .ok_or_else(|| AppError::bad_request("Status is required."))?
        .parse::<TaskStatus>()
        .map_err(|e| AppError::bad_request(format!("{e}")))?;

    if !tasks::update_task_status(&state.pool, task_id, status)
        .await
        .map_err(AppError::internal)?
    {
        return Err(AppError::not_found("Task not found."));
    }
    let task = tasks::get_task(&state.pool, task_id)
        .await
        .map_err(AppError::internal)?;

    Ok(Json(json!({ "message": "Task updated successfully", "task": task })))
}

pub async fn delete_task(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(task_id) = path?;
    let deleted = tasks::delete_task_tree(&state.pool, task_id)
        .await
        .map_err(AppError::internal)?;
    if !deleted {
        return Err(AppError::not_found("Task not found."));
    }
    Ok(Json(json!({ "message": "Task (and any subtasks) deleted successfully" })))
}
