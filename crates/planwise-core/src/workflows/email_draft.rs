//! Email drafting. Nothing is persisted or sent.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{WorkflowError, payload, required_text};
use crate::llm::CompletionClient;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailDraftRequest {
    /// What the email is about.
    pub context: Option<String>,
    pub recipient: Option<String>,
    pub tone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailDraftOutcome {
    pub subject: String,
    pub body: String,
    pub model: String,
}

fn build_prompt(context: &str, recipient: Option<&str>, tone: &str) -> String {
    let recipient_line = recipient
        .map(|r| format!("Recipient: {r}\n"))
        .unwrap_or_default();
    format!(
        r#"You are an assistant that writes concise, clear emails.
{recipient_line}Tone: {tone}
What the email should say: "{context}"

Return ONLY a valid JSON object with keys "subject" (string) and "body" (string, plain text with line breaks as \n).
Do not include markdown tags."#
    )
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Draft an email from a short description of its purpose.
pub async fn draft_email(
    client: &CompletionClient,
    request: &EmailDraftRequest,
) -> Result<EmailDraftOutcome, WorkflowError> {
    let context = required_text("context", request.context.as_deref())?;
    let tone = non_empty(request.tone.as_deref()).unwrap_or("professional");
    let prompt = build_prompt(context, non_empty(request.recipient.as_deref()), tone);

    let completion = client.complete(&prompt).await?;
    let draft = payload::parse_email_draft(&completion.text)?;
    info!(workflow = "email_draft", model = %completion.model, "email drafted");

    Ok(EmailDraftOutcome {
        subject: draft.subject,
        body: draft.body,
        model: completion.model,
    })
}
