//! [`ModelBackend`] for the Gemini `generateContent` REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::backend::{ModelBackend, ModelCallError};

/// Public endpoint root; overridable for tests and proxies.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: [GeminiContent<'a>; 1],
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: [GeminiPart<'a>; 1],
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResContent>,
}

#[derive(Deserialize)]
struct GeminiResContent {
    #[serde(default)]
    parts: Vec<GeminiResPart>,
}

#[derive(Deserialize)]
struct GeminiResPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

pub struct GeminiBackend {
    api_key: String,
    base_url: String,
    client: Client,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.base_url)
    }
}

/// Build a [`ModelCallError::Api`] from a non-success response body.
///
/// The service's error envelope carries a canonical status name such as
/// `UNAVAILABLE` or `RESOURCE_EXHAUSTED`; it is kept in the message so
/// classification can fall back on it.
fn api_error(status: u16, body: &str) -> ModelCallError {
    let message = match serde_json::from_str::<GeminiErrorEnvelope>(body) {
        Ok(envelope) if envelope.error.status.is_empty() => envelope.error.message,
        Ok(envelope) => format!("{}: {}", envelope.error.status, envelope.error.message),
        Err(_) => body.trim().to_string(),
    };
    ModelCallError::Api { status, message }
}

fn response_text(response: GeminiResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ModelCallError> {
        let request = GeminiRequest {
            contents: [GeminiContent {
                role: "user",
                parts: [GeminiPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelCallError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ModelCallError::Malformed(e.to_string()))?;
        Ok(response_text(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shape_is_role_tagged() {
        let request = GeminiRequest {
            contents: [GeminiContent {
                role: "user",
                parts: [GeminiPart { text: "hello" }],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }] })
        );
    }

    #[test]
    fn response_text_joins_parts_of_first_candidate() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}},
                       {"content":{"parts":[{"text":"ignored"}]}}]}"#;
        let parsed: GeminiResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response_text(parsed), "{\"a\":1}");
    }

    #[test]
    fn response_without_candidates_is_empty_text() {
        let parsed: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response_text(parsed), "");
    }

    #[test]
    fn overload_envelope_is_transient() {
        let body = r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#;
        let err = api_error(503, body);
        assert_eq!(
            err,
            ModelCallError::Api {
                status: 503,
                message: "UNAVAILABLE: The model is overloaded.".to_string()
            }
        );
        assert!(err.is_transient());
    }

    #[test]
    fn invalid_argument_envelope_is_terminal() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        assert!(!api_error(400, body).is_transient());
    }

    #[test]
    fn non_json_error_body_is_kept_verbatim() {
        let err = api_error(502, "  bad gateway \n");
        assert_eq!(
            err,
            ModelCallError::Api {
                status: 502,
                message: "bad gateway".to_string()
            }
        );
    }

    #[test]
    fn endpoint_uses_base_url() {
        let backend = GeminiBackend::new("key").with_base_url("http://localhost:9999/v1beta/");
        assert_eq!(
            backend.endpoint("gemini-2.5-flash"),
            "http://localhost:9999/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
