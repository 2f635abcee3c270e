//! Endpoints backed by the model-call wrapper. Each is a thin shell over
//! a workflow in `planwise_core::workflows`.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;

use planwise_core::workflows::{
    self, DecomposeOutcome, DecomposeRequest, EmailDraftOutcome, EmailDraftRequest,
    PrioritizeOutcome, PrioritizeRequest, QuickAddOutcome, QuickAddRequest, StudyPlanOutcome,
    StudyPlanRequest,
};

use crate::serve_cmd::{AppError, AppState};

pub async fn decompose(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<DecomposeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DecomposeOutcome>), AppError> {
    let Path(task_id) = path?;
    let Json(request) = body?;
    let outcome = workflows::decompose(&state.pool, &state.completions, task_id, &request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn quick_add(
    State(state): State<AppState>,
    body: Result<Json<QuickAddRequest>, JsonRejection>,
) -> Result<Json<QuickAddOutcome>, AppError> {
    let Json(request) = body?;
    let outcome = workflows::quick_add(
        &state.pool,
        &state.completions,
        &request,
        Utc::now(),
        &state.time_zone,
    )
    .await?;
    Ok(Json(outcome))
}

pub async fn prioritize(
    State(state): State<AppState>,
    body: Result<Json<PrioritizeRequest>, JsonRejection>,
) -> Result<Json<PrioritizeOutcome>, AppError> {
    let Json(request) = body?;
    let outcome = workflows::prioritize(&state.pool, &state.completions, &request).await?;
    Ok(Json(outcome))
}

pub async fn study_plan(
    State(state): State<AppState>,
    body: Result<Json<StudyPlanRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StudyPlanOutcome>), AppError> {
    let Json(request) = body?;
    let today = Utc::now().date_naive();
    let outcome =
        workflows::study_plan(&state.pool, &state.completions, &request, today).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn email_draft(
    State(state): State<AppState>,
    body: Result<Json<EmailDraftRequest>, JsonRejection>,
) -> Result<Json<EmailDraftOutcome>, AppError> {
    let Json(request) = body?;
    let outcome = workflows::draft_email(&state.completions, &request).await?;
    Ok(Json(outcome))
}
