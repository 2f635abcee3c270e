//! Completion client: retry with backoff, fall over across candidate models.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::backend::{ModelBackend, ModelCallError};
use super::backoff::BackoffPolicy;
use super::schedule::AttemptSchedule;

/// Model identifiers tried when the configuration names none, highest
/// preference first.
pub const DEFAULT_MODEL_CANDIDATES: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-2.0-flash-001",
];

/// Immutable configuration for a [`CompletionClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionConfig {
    /// Ordered model identifiers, highest preference first.
    pub candidates: Vec<String>,
    /// Calls allowed per model before falling over to the next one.
    pub max_attempts_per_model: u32,
    pub backoff: BackoffPolicy,
}

impl CompletionConfig {
    pub const DEFAULT_MAX_ATTEMPTS_PER_MODEL: u32 = 6;
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_MODEL_CANDIDATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_attempts_per_model: Self::DEFAULT_MAX_ATTEMPTS_PER_MODEL,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// A successful completion and the model that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub model: String,
}

/// Failure of the whole retry/fallback sequence.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompletionError {
    /// Every candidate's budget was spent; carries the most recent error.
    #[error("all candidate models failed after {attempts} call(s); last error: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: ModelCallError,
    },

    /// Nothing was attempted: no candidates, or a zero attempt budget.
    #[error("no model candidates to try")]
    NoCandidates,
}

/// Remove markdown code-fence artifacts (```` ```json ```` and ```` ``` ````)
/// and surrounding whitespace from model output.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Obtains text completions from an ordered list of candidate models.
///
/// Cheap to clone; the backend and configuration are shared.
#[derive(Clone)]
pub struct CompletionClient {
    backend: Arc<dyn ModelBackend>,
    config: Arc<CompletionConfig>,
}

impl CompletionClient {
    pub fn new(backend: Arc<dyn ModelBackend>, config: CompletionConfig) -> Self {
        Self {
            backend,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    /// Obtain a completion using the configured attempt budget.
    pub async fn complete(&self, prompt: &str) -> Result<Completion, CompletionError> {
        self.obtain_completion(prompt, self.config.max_attempts_per_model)
            .await
    }

    /// Obtain a completion for `prompt`, trying each candidate model up to
    /// `max_attempts_per_model` times.
    ///
    /// Transient failures before a model's last attempt wait per the backoff
    /// policy and retry the same model. Terminal failures, and transient
    /// failures on the last attempt, move to the next candidate at once.
    pub async fn obtain_completion(
        &self,
        prompt: &str,
        max_attempts_per_model: u32,
    ) -> Result<Completion, CompletionError> {
        let mut schedule = AttemptSchedule::new(&self.config.candidates, max_attempts_per_model);
        let mut calls = 0u32;
        let mut last_error: Option<ModelCallError> = None;

        while let Some(attempt) = schedule.next() {
            calls += 1;
            let outcome = self
                .backend
                .generate(attempt.model, prompt)
                .await
                .and_then(|raw| {
                    let text = strip_code_fences(&raw);
                    if text.is_empty() {
                        Err(ModelCallError::EmptyResponse)
                    } else {
                        Ok(text)
                    }
                });

            match outcome {
                Ok(text) => {
                    info!(
                        backend = self.backend.name(),
                        model = attempt.model,
                        attempt = attempt.number + 1,
                        "completion succeeded"
                    );
                    return Ok(Completion {
                        text,
                        model: attempt.model.to_string(),
                    });
                }
                Err(err) => {
                    if err.is_transient() && !attempt.is_last_for_model {
                        let delay = self.config.backoff.delay_for(attempt.number);
                        warn!(
                            model = attempt.model,
                            attempt = attempt.number + 1,
                            max_attempts = max_attempts_per_model,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "transient model error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!(
                            model = attempt.model,
                            attempts = attempt.number + 1,
                            transient = err.is_transient(),
                            error = %err,
                            "giving up on model"
                        );
                        schedule.abandon_model();
                        debug!("trying fallback model");
                    }
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(last) => Err(CompletionError::Exhausted {
                attempts: calls,
                last,
            }),
            None => Err(CompletionError::NoCandidates),
        }
    }
}
