//! Model-call wrapper for the external generative-language API.
//!
//! A [`CompletionClient`] owns an immutable [`CompletionConfig`] (ordered
//! model candidates, attempts per model, [`BackoffPolicy`]) and a
//! [`ModelBackend`] that performs the actual outbound call.
//!
//! # Architecture
//!
//! ```text
//! workflow
//!     |
//!     v
//! CompletionClient::complete(prompt)
//!     |
//!     |   AttemptSchedule --next()--> (model, attempt)
//!     |        |
//!     |        v
//!     |   ModelBackend::generate(model, prompt)
//!     |        |
//!     |   Ok(text) -> strip fences -> Completion { text, model }
//!     |   Err(transient) -> BackoffPolicy::delay_for(attempt) -> sleep -> retry
//!     |   Err(terminal)  -> AttemptSchedule::abandon_model()
//!     v
//! Completion | CompletionError::Exhausted { last }
//! ```

pub mod backend;
pub mod backoff;
pub mod client;
pub mod gemini;
pub mod schedule;

pub use backend::{ModelBackend, ModelCallError};
pub use backoff::BackoffPolicy;
pub use client::{
    Completion, CompletionClient, CompletionConfig, CompletionError, DEFAULT_MODEL_CANDIDATES,
    strip_code_fences,
};
pub use gemini::GeminiBackend;
pub use schedule::{Attempt, AttemptSchedule};
