use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;

use planwise_core::account::AccountError;
use planwise_core::llm::CompletionClient;
use planwise_core::workflows::WorkflowError;

use crate::routes;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Log the full error chain and answer with a generic 500.
    pub fn internal(err: anyhow::Error) -> Self {
        tracing::error!(error = ?err, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "message": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Validation(msg) => Self::bad_request(msg),
            WorkflowError::NotFound(msg) => Self::not_found(msg),
            WorkflowError::UpstreamFormat(e) => {
                tracing::warn!(error = %e, "unusable AI response");
                Self::new(StatusCode::BAD_GATEWAY, format!("AI returned an unusable response: {e}"))
            }
            WorkflowError::UpstreamExhausted(e) => {
                tracing::error!(error = %e, "AI service unavailable");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AI service is unavailable. Please try again later.",
                )
            }
            WorkflowError::Persistence(e) => Self::internal(e),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(msg) => Self::bad_request(msg),
            AccountError::EmailTaken => {
                Self::new(StatusCode::CONFLICT, "Error: Email already in use.")
            }
            AccountError::UnknownEmail => Self::not_found("Invalid email or password."),
            AccountError::WrongPassword => {
                Self::new(StatusCode::UNAUTHORIZED, "Invalid email or password.")
            }
            AccountError::Persistence(e) => Self::internal(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Shared by every request: the pool and the completion client are the only
/// cross-request state.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub completions: CompletionClient,
    /// Zone assumed for quick-add requests that do not carry one.
    pub time_zone: Arc<str>,
}

impl AppState {
    pub fn new(pool: PgPool, completions: CompletionClient, time_zone: &str) -> Self {
        Self {
            pool,
            completions,
            time_zone: Arc::from(time_zone),
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/signup", post(routes::accounts::signup))
        .route("/login", post(routes::accounts::login))
        .route("/tasks", post(routes::tasks::create_task).get(routes::tasks::list_tasks))
        .route(
            "/tasks/{id}",
            put(routes::tasks::update_task).delete(routes::tasks::delete_task),
        )
        .route("/tasks/{id}/decompose", post(routes::ai::decompose))
        .route("/tasks/ai-prioritize", post(routes::ai::prioritize))
        .route("/tasks/{id}/assign", post(routes::sharing::assign_task))
        .route(
            "/tasks/{id}/comments",
            get(routes::sharing::list_comments).post(routes::sharing::add_comment),
        )
        .route("/tasks/{id}/reminders", post(routes::reminders::create_reminder))
        .route("/reminders/check", get(routes::reminders::check_reminders))
        .route("/reminders/ack", post(routes::reminders::acknowledge))
        .route("/events", post(routes::events::create_event).get(routes::events::list_events))
        .route("/events/{id}", delete(routes::events::delete_event))
        .route("/ai-quick-add", post(routes::ai::quick_add))
        .route("/ai-study-plan", post(routes::ai::study_plan))
        .route("/ai-email-draft", post(routes::ai::email_draft))
        .route("/analytics", get(routes::analytics::summary))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("planwise serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("planwise serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl+C handler: {e}");
        std::future::pending::<()>().await;
    }
}
