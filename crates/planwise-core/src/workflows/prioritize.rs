//! Let the model rank a user's open tasks.

use std::collections::HashSet;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use planwise_db::models::Task;
use planwise_db::queries::tasks;

use super::payload::{self, PriorityUpdate};
use super::{Stage, WorkflowError, required_id, rolled_back};
use crate::llm::CompletionClient;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizeRequest {
    #[serde(alias = "user_id")]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrioritizeOutcome {
    pub message: String,
    /// `None` when there was nothing to rank and the model was not called.
    pub model: Option<String>,
    /// Rows whose priority was written.
    pub updated: u64,
    /// Updates naming a task outside the submitted batch.
    pub ignored: usize,
    pub updates: Vec<PriorityUpdate>,
}

#[derive(Serialize)]
struct PromptTask<'a> {
    id: i64,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<String>,
}

fn build_prompt(open: &[Task]) -> String {
    let batch: Vec<PromptTask<'_>> = open
        .iter()
        .map(|t| PromptTask {
            id: t.task_id,
            title: &t.title,
            due_date: t.due_date.map(|d| d.to_string()),
        })
        .collect();
    let listing = serde_json::to_string_pretty(&batch).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"You are a productivity coach. Assign a priority to each of the user's open tasks.
Return ONLY a valid JSON object with a single key "updates": an array of objects, each with "id" (the task id, unchanged) and "priority" (exactly one of "High", "Medium", "Low").
Consider urgency (due dates) and impact. Do not invent ids. Do not include markdown tags.

Example:
{{ "updates": [ {{ "id": 12, "priority": "High" }}, {{ "id": 15, "priority": "Low" }} ] }}

Tasks:
{listing}"#
    )
}

/// Rank the user's open (`todo`) tasks and write the new priorities in one
/// transaction.
///
/// Only tasks in the batch sent to the model can change; updates naming
/// any other id are ignored.
pub async fn prioritize(
    pool: &PgPool,
    client: &CompletionClient,
    request: &PrioritizeRequest,
) -> Result<PrioritizeOutcome, WorkflowError> {
    let user_id = required_id("userId", request.user_id)?;
    debug!(workflow = "prioritize", user_id, stage = %Stage::Received);

    let open = tasks::list_open_tasks(pool, user_id).await?;
    if open.is_empty() {
        return Ok(PrioritizeOutcome {
            message: "No open tasks to prioritize.".to_string(),
            model: None,
            updated: 0,
            ignored: 0,
            updates: Vec::new(),
        });
    }

    debug!(workflow = "prioritize", stage = %Stage::Prompting, batch = open.len());
    let completion = client.complete(&build_prompt(&open)).await?;

    debug!(workflow = "prioritize", stage = %Stage::Parsing, model = %completion.model);
    let batch: HashSet<i64> = open.iter().map(|t| t.task_id).collect();
    let (updates, foreign): (Vec<PriorityUpdate>, Vec<PriorityUpdate>) =
        payload::parse_priority_updates(&completion.text)?
            .into_iter()
            .partition(|u| batch.contains(&u.task_id));
    if !foreign.is_empty() {
        warn!(
            workflow = "prioritize",
            ignored = foreign.len(),
            "model returned ids outside the batch"
        );
    }

    debug!(workflow = "prioritize", stage = %Stage::Persisting, count = updates.len());
    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let mut updated = 0;
    for update in &updates {
        updated += tasks::update_task_priority(&mut *tx, update.task_id, user_id, update.priority)
            .await
            .map_err(rolled_back("prioritize"))?;
    }
    tx.commit().await.context("failed to commit transaction")?;

    info!(
        workflow = "prioritize",
        stage = %Stage::Committed,
        user_id,
        model = %completion.model,
        updated,
        "priorities updated"
    );

    Ok(PrioritizeOutcome {
        message: format!("Updated priority for {updated} task(s)."),
        model: Some(completion.model),
        updated,
        ignored: foreign.len(),
        updates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use planwise_db::models::{Priority, TaskStatus};

    fn task(id: i64, title: &str, due: Option<NaiveDate>) -> Task {
        Task {
            task_id: id,
            owner_user_id: 1,
            parent_task_id: None,
            title: title.to_string(),
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            due_date: due,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn prompt_lists_batch_as_json() {
        let prompt = build_prompt(&[
            task(3, "File taxes", NaiveDate::from_ymd_opt(2026, 4, 15)),
            task(8, "Water plants", None),
        ]);
        assert!(prompt.contains(r#""id": 3"#));
        assert!(prompt.contains(r#""due_date": "2026-04-15""#));
        assert!(prompt.contains(r#""title": "Water plants""#));
        assert_eq!(prompt.matches("due_date").count(), 1);
    }
}
