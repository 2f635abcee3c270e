//! Behaviour of the completion wrapper against scripted backends.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use planwise_core::llm::{
    BackoffPolicy, CompletionClient, CompletionConfig, CompletionError, ModelBackend,
    ModelCallError,
};

/// Replays a fixed sequence of outcomes and records which model each call
/// targeted. Once the script runs out every call fails terminally.
struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, ModelCallError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new(script: Vec<Result<String, ModelCallError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, model: &str, _prompt: &str) -> Result<String, ModelCallError> {
        self.calls.lock().unwrap().push(model.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(api(400, "script exhausted")))
    }
}

/// Always fails with the same error.
struct FailingBackend(ModelCallError);

#[async_trait]
impl ModelBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, ModelCallError> {
        Err(self.0.clone())
    }
}

fn api(status: u16, message: &str) -> ModelCallError {
    ModelCallError::Api {
        status,
        message: message.to_string(),
    }
}

fn overloaded() -> ModelCallError {
    api(503, "UNAVAILABLE: The model is overloaded.")
}

fn config(models: &[&str], attempts: u32, backoff: BackoffPolicy) -> CompletionConfig {
    CompletionConfig {
        candidates: models.iter().map(|m| m.to_string()).collect(),
        max_attempts_per_model: attempts,
        backoff,
    }
}

#[tokio::test]
async fn first_success_is_returned_with_its_model() {
    let backend = ScriptedBackend::new(vec![Ok("hello".into())]);
    let client = CompletionClient::new(
        backend.clone(),
        config(&["m1", "m2"], 3, BackoffPolicy::none()),
    );

    let completion = client.complete("hi").await.unwrap();
    assert_eq!(completion.text, "hello");
    assert_eq!(completion.model, "m1");
    assert_eq!(backend.calls(), vec!["m1"]);
}

#[tokio::test]
async fn transient_failures_retry_then_fall_over() {
    // m1 fails on all three attempts, m2 fails once and then answers.
    let backend = ScriptedBackend::new(vec![
        Err(overloaded()),
        Err(api(429, "Resource exhausted")),
        Err(api(500, "internal")),
        Err(overloaded()),
        Ok("from m2".into()),
    ]);
    let client = CompletionClient::new(
        backend.clone(),
        config(&["m1", "m2", "m3"], 3, BackoffPolicy::none()),
    );

    let completion = client.complete("hi").await.unwrap();
    assert_eq!(completion.text, "from m2");
    assert_eq!(completion.model, "m2");
    assert_eq!(backend.calls(), vec!["m1", "m1", "m1", "m2", "m2"]);
}

#[tokio::test]
async fn terminal_failure_skips_remaining_attempts_on_model() {
    let backend = ScriptedBackend::new(vec![
        Err(api(400, "API key not valid")),
        Ok("fallback".into()),
    ]);
    let client = CompletionClient::new(
        backend.clone(),
        config(&["m1", "m2"], 5, BackoffPolicy::none()),
    );

    let completion = client.complete("hi").await.unwrap();
    assert_eq!(completion.model, "m2");
    assert_eq!(backend.calls(), vec!["m1", "m2"]);
}

#[tokio::test]
async fn exhaustion_reports_last_error_and_call_count() {
    let backend = ScriptedBackend::new(vec![
        Err(overloaded()),
        Err(overloaded()),
        Err(overloaded()),
        Err(api(404, "model not found")),
    ]);
    let client = CompletionClient::new(
        backend.clone(),
        config(&["m1", "m2"], 3, BackoffPolicy::none()),
    );

    let err = client.complete("hi").await.unwrap_err();
    match err {
        CompletionError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 4);
            assert_eq!(last, api(404, "model not found"));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
    assert_eq!(backend.calls(), vec!["m1", "m1", "m1", "m2"]);
}

#[tokio::test]
async fn fenced_output_is_stripped() {
    let backend = ScriptedBackend::new(vec![Ok("```json\n{\"subtasks\":[]}\n```".into())]);
    let client = CompletionClient::new(backend, config(&["m1"], 1, BackoffPolicy::none()));

    let completion = client.complete("hi").await.unwrap();
    assert_eq!(completion.text, "{\"subtasks\":[]}");
}

#[tokio::test]
async fn empty_output_counts_as_transient_and_is_retried() {
    let backend = ScriptedBackend::new(vec![Ok("```json\n```".into()), Ok("  \n".into()), Ok("ok".into())]);
    let client = CompletionClient::new(
        backend.clone(),
        config(&["m1"], 3, BackoffPolicy::none()),
    );

    let completion = client.complete("hi").await.unwrap();
    assert_eq!(completion.text, "ok");
    assert_eq!(backend.calls(), vec!["m1", "m1", "m1"]);
}

#[tokio::test]
async fn empty_output_on_every_attempt_exhausts() {
    let backend = ScriptedBackend::new(vec![Ok(String::new()), Ok(String::new())]);
    let client = CompletionClient::new(backend, config(&["m1"], 2, BackoffPolicy::none()));

    match client.complete("hi").await.unwrap_err() {
        CompletionError::Exhausted { last, .. } => assert_eq!(last, ModelCallError::EmptyResponse),
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn zero_budget_or_no_candidates_makes_no_calls() {
    let backend = ScriptedBackend::new(vec![Ok("unused".into())]);
    let client = CompletionClient::new(
        backend.clone(),
        config(&["m1"], 3, BackoffPolicy::none()),
    );
    assert!(matches!(
        client.obtain_completion("hi", 0).await,
        Err(CompletionError::NoCandidates)
    ));

    let empty = CompletionClient::new(backend.clone(), config(&[], 3, BackoffPolicy::none()));
    assert!(matches!(
        empty.complete("hi").await,
        Err(CompletionError::NoCandidates)
    ));
    assert!(backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn retries_wait_per_backoff_policy() {
    let policy = BackoffPolicy::default();
    let client = CompletionClient::new(
        Arc::new(FailingBackend(overloaded())),
        config(&["m1"], 3, policy),
    );

    let started = Instant::now();
    let err = client.complete("hi").await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, CompletionError::Exhausted { attempts: 3, .. }));
    // Two waits: 300ms and 600ms plus up to 250ms jitter each. No wait
    // follows the final attempt.
    assert!(elapsed >= Duration::from_millis(900), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1400), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn each_wait_is_bounded_by_max_delay() {
    let policy = BackoffPolicy {
        base_delay: Duration::from_millis(300),
        max_delay: Duration::from_millis(1000),
        jitter: Duration::from_millis(250),
    };
    let attempts = 8;
    let client = CompletionClient::new(
        Arc::new(FailingBackend(overloaded())),
        config(&["m1", "m2"], attempts, policy),
    );

    let started = Instant::now();
    client.complete("hi").await.unwrap_err();
    let elapsed = started.elapsed();

    let waits = 2 * (attempts - 1);
    assert!(elapsed <= policy.max_delay * waits, "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn terminal_errors_never_wait() {
    let client = CompletionClient::new(
        Arc::new(FailingBackend(api(403, "permission denied"))),
        config(&["m1", "m2", "m3"], 6, BackoffPolicy::default()),
    );

    let started = Instant::now();
    match client.complete("hi").await.unwrap_err() {
        CompletionError::Exhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected Exhausted, got {other:?}"),
    }
    assert_eq!(started.elapsed(), Duration::ZERO);
}
