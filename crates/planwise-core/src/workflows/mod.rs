//! AI-backed workflows.
//!
//! Each workflow follows the same shape:
//!
//! 1. validate the request (no model call on failure),
//! 2. read whatever state the prompt needs and release the connection,
//! 3. obtain a completion through [`CompletionClient`](crate::llm::CompletionClient),
//! 4. parse the text into a typed payload ([`payload`]),
//! 5. write every derived row inside one transaction.
//!
//! A workflow either commits the full batch or leaves the database
//! untouched; dropping an uncommitted `sqlx::Transaction` rolls it back.

pub mod decompose;
pub mod email_draft;
pub mod payload;
pub mod prioritize;
pub mod quick_add;
pub mod study_plan;

use std::fmt;

use tracing::warn;

use crate::llm::CompletionError;
use payload::PayloadError;

pub use decompose::{DecomposeOutcome, DecomposeRequest, decompose};
pub use email_draft::{EmailDraftOutcome, EmailDraftRequest, draft_email};
pub use prioritize::{PrioritizeOutcome, PrioritizeRequest, prioritize};
pub use quick_add::{QuickAddOutcome, QuickAddRequest, quick_add};
pub use study_plan::{StudyPlanOutcome, StudyPlanRequest, study_plan};

/// Failure of a workflow invocation.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// A required request field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// A row the workflow depends on does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Every candidate model failed.
    #[error("AI service unavailable: {0}")]
    UpstreamExhausted(#[from] CompletionError),

    /// The model answered, but not in the expected shape.
    #[error("AI returned an unusable response: {0}")]
    UpstreamFormat(#[from] PayloadError),

    /// A database read or write failed; nothing was committed.
    #[error("database error: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

/// Where an invocation is in its lifecycle. Used as a structured log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Prompting,
    Parsing,
    Persisting,
    Committed,
    RolledBack,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Prompting => "prompting",
            Self::Parsing => "parsing",
            Self::Persisting => "persisting",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        };
        f.write_str(s)
    }
}

/// Error mapper for writes inside a workflow transaction. Logs the
/// rollback; the transaction itself rolls back when it is dropped.
pub(crate) fn rolled_back(workflow: &'static str) -> impl FnOnce(anyhow::Error) -> WorkflowError {
    move |err| {
        warn!(workflow, stage = %Stage::RolledBack, error = ?err, "transaction rolled back");
        WorkflowError::Persistence(err)
    }
}

/// Return the trimmed value of a required text field.
pub(crate) fn required_text<'a>(
    field: &str,
    value: Option<&'a str>,
) -> Result<&'a str, WorkflowError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(WorkflowError::Validation(format!("{field} is required"))),
    }
}

/// Return a required numeric identifier.
pub(crate) fn required_id(field: &str, value: Option<i64>) -> Result<i64, WorkflowError> {
    value.ok_or_else(|| WorkflowError::Validation(format!("{field} is required")))
}
