//! Task sharing and comments.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use planwise_db::models::TaskComment;
use planwise_db::queries::{assignments, comments, tasks, users};

use super::present;
use crate::serve_cmd::{AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct AssignBody {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentBody {
    #[serde(alias = "user_id")]
    pub user_id: Option<i64>,
    pub text: Option<String>,
}

async fn require_task(state: &AppState, task_id: i64) -> Result<(), AppError> {
    match tasks::get_task(&state.pool, task_id)
        .await
        .map_err(AppError::internal)?
    {
        Some(_) => Ok(()),
        None => Err(AppError::not_found("Task not found.")),
    }
}

/// Share a task with the user registered under `email`. Sharing twice is a
/// no-op.
pub async fn assign_task(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<AssignBody>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(task_id) = path?;
    let Json(body) = body?;
    let email = present(body.email.as_deref())
        .ok_or_else(|| AppError::bad_request("Email is required."))?;

    require_task(&state, task_id).await?;
    let user = users::get_user_by_email(&state.pool, email)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found("No user with that email."))?;

    let created = assignments::assign_task(&state.pool, task_id, user.user_id)
        .await
        .map_err(AppError::internal)?;
    tracing::info!(task_id, user_id = user.user_id, created, "task shared");

    Ok(Json(json!({
        "message": format!("Task shared with {}.", user.full_name),
        "userId": user.user_id,
    })))
}

pub async fn list_comments(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<TaskComment>>, AppError> {
    let Path(task_id) = path?;
    require_task(&state, task_id).await?;
    let rows = comments::list_comments_for_task(&state.pool, task_id)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(rows))
}

pub async fn add_comment(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<CommentBody>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskComment>), AppError> {
    let Path(task_id) = path?;
    let Json(body) = body?;
    let (Some(user_id), Some(text)) = (body.user_id, present(body.text.as_deref())) else {
        return Err(AppError::bad_request("User ID and comment text are required."));
    };

    require_task(&state, task_id).await?;
    let comment = comments::insert_comment(&state.pool, task_id, user_id, text)
        .await
        .map_err(AppError::internal)?;
    Ok((StatusCode::CREATED, Json(comment)))
}
