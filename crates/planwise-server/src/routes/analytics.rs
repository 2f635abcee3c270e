use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use chrono::Utc;

use planwise_core::analytics::{self, AnalyticsSummary};

use super::UserQuery;
use crate::serve_cmd::{AppError, AppState};

pub async fn summary(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<AnalyticsSummary>, AppError> {
    let Query(query) = query?;
    let user_id = query.require()?;
    let today = Utc::now().date_naive();
    let summary = analytics::summarize(&state.pool, user_id, today)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(summary))
}
