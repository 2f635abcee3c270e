//! The `ModelBackend` trait -- the seam between the completion wrapper and
//! the external model service.

use async_trait::async_trait;

/// HTTP statuses the service uses for rate limiting, internal errors and
/// overload.
const TRANSIENT_STATUSES: &[u16] = &[429, 500, 503];

/// Message fragments the service uses for the same conditions when no
/// status code is available. Matched case-insensitively.
const TRANSIENT_MARKERS: &[&str] = &["unavailable", "overloaded", "resource exhausted"];

/// A failed call to the external model service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelCallError {
    /// The service answered with a non-success status.
    #[error("model API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response (connect, TLS, timeout).
    #[error("model request failed: {0}")]
    Transport(String),

    /// The call succeeded but carried no text once code fences were removed.
    #[error("empty response from model")]
    EmptyResponse,

    /// The response body could not be understood.
    #[error("unexpected model response: {0}")]
    Malformed(String),
}

impl ModelCallError {
    /// Whether the failure is worth retrying on the same model.
    ///
    /// Rate limiting, overload and internal errors are transient, as is an
    /// empty completion. Everything else is terminal for the current model.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { status, message } => {
                TRANSIENT_STATUSES.contains(status) || has_transient_marker(message)
            }
            Self::Transport(message) | Self::Malformed(message) => has_transient_marker(message),
            Self::EmptyResponse => true,
        }
    }
}

fn has_transient_marker(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Adapter interface for a text-generation service.
///
/// Object-safe so the client can hold an `Arc<dyn ModelBackend>`; tests
/// substitute scripted implementations.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Human-readable name of the service (e.g. "gemini").
    fn name(&self) -> &str;

    /// Send `prompt` as a single user-role message to `model` and return the
    /// raw response text.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ModelCallError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn ModelBackend) {}
};
