//! Completion statistics.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use sqlx::PgPool;

use planwise_db::queries::tasks;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total: i64,
    pub completed: i64,
    /// Whole percent of tasks done, 0 when there are none.
    pub completion_rate: i64,
    /// Consecutive days with at least one completion.
    pub streak: u32,
}

/// Percentage of completed tasks, rounded to the nearest whole number.
pub fn completion_rate(total: i64, completed: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    (completed * 100 + total / 2) / total
}

/// Length of the run of consecutive completion days ending today, or
/// yesterday when nothing has been completed yet today.
///
/// `days` must be distinct and sorted newest first. Days after `today` are
/// ignored.
pub fn completion_streak(days: &[NaiveDate], today: NaiveDate) -> u32 {
    let mut days = days.iter().copied().skip_while(|d| *d > today).peekable();

    let mut expected = match days.peek() {
        Some(&d) if d == today => today,
        Some(&d) if today.checked_sub_days(Days::new(1)) == Some(d) => d,
        _ => return 0,
    };

    let mut streak = 0;
    for day in days {
        if day != expected {
            break;
        }
        streak += 1;
        match expected.checked_sub_days(Days::new(1)) {
            Some(prev) => expected = prev,
            None => break,
        }
    }
    streak
}

/// Completion totals and streak for a user's own tasks.
pub async fn summarize(pool: &PgPool, user_id: i64, today: NaiveDate) -> anyhow::Result<AnalyticsSummary> {
    let counts = tasks::completion_counts(pool, user_id).await?;
    let days = tasks::completion_days(pool, user_id).await?;

    Ok(AnalyticsSummary {
        total: counts.total,
        completed: counts.completed,
        completion_rate: completion_rate(counts.total, counts.completed),
        streak: completion_streak(&days, today),
    })
}
