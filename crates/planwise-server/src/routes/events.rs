use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use planwise_db::models::Event;
use planwise_db::queries::calendars;
use planwise_db::queries::events::{self, NewEvent};

use super::{UserQuery, parse_instant, present};
use crate::serve_cmd::{AppError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventBody {
    pub title: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(alias = "owner_user_id")]
    pub user_id: Option<i64>,
}

pub async fn create_event(
    State(state): State<AppState>,
    body: Result<Json<CreateEventBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(body) = body?;
    let (Some(title), Some(start), Some(end), Some(user_id)) = (
        present(body.title.as_deref()),
        present(body.start_time.as_deref()),
        present(body.end_time.as_deref()),
        body.user_id,
    ) else {
        return Err(AppError::bad_request("All event fields are required."));
    };
    let start_time = parse_instant("startTime", start)?;
    let end_time = parse_instant("endTime", end)?;
    if end_time < start_time {
        return Err(AppError::bad_request("End time must not be before start time."));
    }

    let calendar = calendars::primary_calendar(&state.pool, user_id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found("User calendar not found."))?;

    let new = NewEvent {
        calendar_id: calendar.calendar_id,
        title,
        start_time,
        end_time,
    };
    let event = events::insert_event(&state.pool, &new)
        .await
        .map_err(AppError::internal)?;
    tracing::info!(event_id = event.event_id, user_id, "event created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Event created successfully!", "event": event })),
    ))
}

pub async fn list_events(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<Vec<Event>>, AppError> {
    let Query(query) = query?;
    let user_id = query.require()?;
    let rows = events::list_events_for_user(&state.pool, user_id)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(rows))
}

pub async fn delete_event(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(event_id) = path?;
    if !events::delete_event(&state.pool, event_id)
        .await
        .map_err(AppError::internal)?
    {
        return Err(AppError::not_found("Event not found."));
    }
    Ok(Json(json!({ "message": "Event deleted successfully" })))
}
