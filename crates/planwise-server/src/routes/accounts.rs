use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde_json::{Value, json};

use planwise_core::account::{self, LoginRequest, SignupRequest};

use crate::serve_cmd::{AppError, AppState};

pub async fn signup(
    State(state): State<AppState>,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(request) = body?;
    let (user, _calendar) = account::sign_up(&state.pool, &request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully! Please log in.",
            "user": user,
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = body?;
    let user = account::log_in(&state.pool, &request).await?;
    Ok(Json(json!({
        "message": "Login successful!",
        "user": user,
    })))
}
