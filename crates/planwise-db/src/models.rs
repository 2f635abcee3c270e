use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Completion status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    Done,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Todo => "todo",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Self::Todo),
            "done" => Ok(Self::Done),
            other => Err(TaskStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TaskStatus`] string.
#[derive(Debug, Clone)]
pub struct TaskStatusParseError(pub String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task status: {:?} (expected todo or done)", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

// ---------------------------------------------------------------------------

/// Task priority. Stored and serialized in title case.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        };
        f.write_str(s)
    }
}

impl FromStr for Priority {
    type Err = PriorityParseError;

    /// Strict parse: only the stored title-case spellings are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "High" => Ok(Self::High),
            "Medium" => Ok(Self::Medium),
            "Low" => Ok(Self::Low),
            other => Err(PriorityParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Priority`] string.
#[derive(Debug, Clone)]
pub struct PriorityParseError(pub String);

impl fmt::Display for PriorityParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid priority: {:?} (expected High, Medium, or Low)", self.0)
    }
}

impl std::error::Error for PriorityParseError {}

// ---------------------------------------------------------------------------

/// Delivery status of a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Pending,
    Sent,
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------

/// How the requesting user relates to a listed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskRole {
    Owner,
    Assignee,
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A registered user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub user_id: i64,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A calendar owned by a user. Every user gets one at sign-up.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Calendar {
    pub calendar_id: i64,
    pub owner_user_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A task, optionally a subtask of `parent_task_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub task_id: i64,
    pub owner_user_id: i64,
    pub parent_task_id: Option<i64>,
    pub title: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A task as seen by one user: owned or shared with them.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TaskWithRole {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub task: Task,
    pub role: TaskRole,
    pub assignment_count: i64,
}

/// A calendar event.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub event_id: i64,
    pub calendar_id: i64,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A task shared with another user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskAssignment {
    pub task_id: i64,
    pub user_id: i64,
    pub assigned_at: DateTime<Utc>,
}

/// A comment joined with its author's display name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskComment {
    pub comment_id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub full_name: String,
    pub comment_text: String,
    pub created_at: DateTime<Utc>,
}

/// A reminder attached to a task.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reminder {
    pub reminder_id: i64,
    pub task_id: i64,
    pub remind_at: DateTime<Utc>,
    pub status: ReminderStatus,
    pub created_at: DateTime<Utc>,
}

/// A pending reminder whose fire time has passed, with its task title.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DueReminder {
    pub reminder_id: i64,
    pub task_id: i64,
    pub title: String,
    pub remind_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
