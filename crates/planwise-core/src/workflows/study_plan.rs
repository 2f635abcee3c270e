//! Study-plan generation: one high-priority task per study session.

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use planwise_db::models::{Priority, Task};
use planwise_db::queries::tasks;

use super::payload::{self, PayloadError, StudyItem};
use super::{Stage, WorkflowError, required_id, required_text, rolled_back};
use crate::llm::CompletionClient;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlanRequest {
    #[serde(alias = "user_id")]
    pub user_id: Option<i64>,
    pub subject: Option<String>,
    /// `YYYY-MM-DD`.
    pub exam_date: Option<String>,
    pub focus_areas: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudyPlanOutcome {
    pub message: String,
    pub model: String,
    pub tasks: Vec<Task>,
}

struct PlanInputs<'a> {
    subject: &'a str,
    exam_date: NaiveDate,
    focus_areas: Option<&'a str>,
    today: NaiveDate,
}

impl PlanInputs<'_> {
    fn days_until_exam(&self) -> i64 {
        (self.exam_date - self.today).num_days()
    }

    /// Sessions must fall between today and the exam, inclusive.
    fn in_window(&self, date: NaiveDate) -> bool {
        (self.today..=self.exam_date).contains(&date)
    }
}

fn build_prompt(inputs: &PlanInputs<'_>) -> String {
    let focus = inputs.focus_areas.unwrap_or("general review of the whole subject");
    format!(
        r#"You are a study coach. Create a study schedule for an upcoming exam.
Subject: "{subject}"
Exam date: {exam}
Today: {today} ({days} day(s) until the exam)
Focus areas: {focus}

Return ONLY a valid JSON object with a single key "plan": an array of objects, each with "title" (a short, concrete study session) and "date" ("YYYY-MM-DD", between today and the exam date inclusive).
Spread sessions sensibly and finish with a final review. Do not include markdown tags.

Example:
{{ "plan": [ {{ "title": "Review lecture notes 1-3", "date": "2025-11-02" }}, {{ "title": "Practice exam", "date": "2025-11-05" }} ] }}"#,
        subject = inputs.subject,
        exam = inputs.exam_date,
        today = inputs.today,
        days = inputs.days_until_exam(),
    )
}

/// Generate a study plan for `request.subject` and store one `High`
/// priority task per session, due on the session date.
///
/// `today` is the caller's current date; exam dates before it are rejected.
pub async fn study_plan(
    pool: &PgPool,
    client: &CompletionClient,
    request: &StudyPlanRequest,
    today: NaiveDate,
) -> Result<StudyPlanOutcome, WorkflowError> {
    let user_id = required_id("userId", request.user_id)?;
    let subject = required_text("subject", request.subject.as_deref())?;
    let exam_raw = required_text("examDate", request.exam_date.as_deref())?;
    let exam_date = NaiveDate::parse_from_str(exam_raw, "%Y-%m-%d").map_err(|_| {
        WorkflowError::Validation(format!("examDate must be YYYY-MM-DD, got {exam_raw:?}"))
    })?;
    if exam_date < today {
        return Err(WorkflowError::Validation(
            "examDate must not be in the past".to_string(),
        ));
    }
    let inputs = PlanInputs {
        subject,
        exam_date,
        focus_areas: request
            .focus_areas
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty()),
        today,
    };
    debug!(workflow = "study_plan", user_id, stage = %Stage::Received);

    debug!(workflow = "study_plan", stage = %Stage::Prompting, days = inputs.days_until_exam());
    let completion = client.complete(&build_prompt(&inputs)).await?;

    debug!(workflow = "study_plan", stage = %Stage::Parsing, model = %completion.model);
    let parsed = payload::parse_study_plan(&completion.text)?;
    let total = parsed.len();
    let sessions: Vec<StudyItem> = parsed
        .into_iter()
        .filter(|item| inputs.in_window(item.date))
        .collect();
    if sessions.len() < total {
        warn!(
            workflow = "study_plan",
            dropped = total - sessions.len(),
            "discarded sessions outside the study window"
        );
    }
    if sessions.is_empty() {
        return Err(PayloadError::NoUsableItems {
            key: "plan",
            dropped: total,
        }
        .into());
    }

    debug!(workflow = "study_plan", stage = %Stage::Persisting, count = sessions.len());
    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let mut created = Vec::with_capacity(sessions.len());
    for session in &sessions {
        let new = tasks::NewTask {
            priority: Priority::High,
            due_date: Some(session.date),
            ..tasks::NewTask::new(user_id, &session.title)
        };
        let task = tasks::insert_task(&mut *tx, &new)
            .await
            .map_err(rolled_back("study_plan"))?;
        created.push(task);
    }
    tx.commit().await.context("failed to commit transaction")?;

    info!(
        workflow = "study_plan",
        stage = %Stage::Committed,
        user_id,
        model = %completion.model,
        sessions = created.len(),
        "study plan stored"
    );

    Ok(StudyPlanOutcome {
        message: format!("Study plan created with {} session(s).", created.len()),
        model: completion.model,
        tasks: created,
    })
}
