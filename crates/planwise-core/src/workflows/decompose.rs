//! Break a task into subtasks.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, info};

use planwise_db::models::Task;
use planwise_db::queries::tasks;

use super::{Stage, WorkflowError, payload, required_id, rolled_back};
use crate::llm::CompletionClient;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecomposeRequest {
    #[serde(alias = "user_id")]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecomposeOutcome {
    pub message: String,
    pub model: String,
    /// Subtasks created by this call, in insertion order.
    pub subtasks: Vec<Task>,
}

fn build_prompt(parent_title: &str) -> String {
    format!(
        r#"You are a project management assistant. Break the following complex task into 3-5 small, actionable subtasks.
Return ONLY a valid JSON object with a single key "subtasks", which is an array of strings.
Do not include markdown tags like ```json or any other text.

Example Task: "Write final research paper"
Your JSON:
{{
  "subtasks": [
    "Draft outline",
    "Gather 5 academic sources",
    "Write introduction",
    "Write body paragraphs",
    "Write conclusion and proofread"
  ]
}}

Now, decompose this task: "{parent_title}""#
    )
}

/// Ask the model to split task `parent_task_id` and insert the resulting
/// subtasks, owned by the requesting user, in one transaction.
pub async fn decompose(
    pool: &PgPool,
    client: &CompletionClient,
    parent_task_id: i64,
    request: &DecomposeRequest,
) -> Result<DecomposeOutcome, WorkflowError> {
    let user_id = required_id("userId", request.user_id)?;
    debug!(workflow = "decompose", parent_task_id, stage = %Stage::Received);

    let parent = tasks::get_task(pool, parent_task_id)
        .await?
        .ok_or_else(|| WorkflowError::NotFound("Parent task not found.".to_string()))?;

    debug!(workflow = "decompose", stage = %Stage::Prompting);
    let completion = client.complete(&build_prompt(&parent.title)).await?;

    debug!(workflow = "decompose", stage = %Stage::Parsing, model = %completion.model);
    let titles = payload::parse_subtasks(&completion.text)?;

    debug!(workflow = "decompose", stage = %Stage::Persisting, count = titles.len());
    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let mut subtasks = Vec::with_capacity(titles.len());
    for title in &titles {
        let new = tasks::NewTask {
            parent_task_id: Some(parent.task_id),
            ..tasks::NewTask::new(user_id, title)
        };
        let task = tasks::insert_task(&mut *tx, &new)
            .await
            .map_err(rolled_back("decompose"))?;
        subtasks.push(task);
    }
    tx.commit().await.context("failed to commit transaction")?;

    info!(
        workflow = "decompose",
        stage = %Stage::Committed,
        parent_task_id,
        model = %completion.model,
        subtasks = subtasks.len(),
        "task decomposed"
    );

    Ok(DecomposeOutcome {
        message: "Task decomposed successfully!".to_string(),
        model: completion.model,
        subtasks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_parent_and_shape() {
        let prompt = build_prompt("Plan team offsite");
        assert!(prompt.contains(r#"single key "subtasks""#));
        assert!(prompt.ends_with(r#"decompose this task: "Plan team offsite""#));
    }
}
