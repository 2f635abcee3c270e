//! Domain logic for planwise: the model-call wrapper, the AI-backed
//! workflows that consume its output, account management, and analytics.

pub mod account;
pub mod analytics;
pub mod llm;
pub mod workflows;
