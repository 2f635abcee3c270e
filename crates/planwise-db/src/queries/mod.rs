//! Query functions, one module per table.
//!
//! Every function is generic over [`sqlx::PgExecutor`] so the same query runs
//! against the pool directly or inside a caller-owned transaction
//! (`&mut *tx`).

pub mod assignments;
pub mod calendars;
pub mod comments;
pub mod events;
pub mod reminders;
pub mod tasks;
pub mod users;
