//! Typed interpretations of model output.
//!
//! The model is asked for a JSON object of a known shape. Parsing happens in
//! two layers: the envelope (valid JSON, an object, the expected array key)
//! must be right or the whole payload is rejected with a [`PayloadError`];
//! individual array elements that fail to deserialize or validate are
//! dropped and counted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use planwise_db::models::Priority;

/// Event length used when the model omits `durationMinutes` or gives a
/// non-numeric or non-positive value.
pub const DEFAULT_EVENT_MINUTES: i64 = 60;

/// Longest event accepted from the model; longer durations are clamped.
pub const MAX_EVENT_MINUTES: i64 = 7 * 24 * 60;

/// Longest title the `tasks` and `events` columns hold (`VARCHAR(255)`).
pub const MAX_TITLE_CHARS: usize = 255;

/// Subtasks kept from one decompose reply; the prompt asks for 3-5.
pub const MAX_SUBTASKS: usize = 5;

/// Events kept from one quick-add reply.
pub const MAX_QUICK_ADD_EVENTS: usize = 10;

/// Tasks kept from one quick-add reply.
pub const MAX_QUICK_ADD_TASKS: usize = 10;

/// Sessions kept from one study-plan reply.
pub const MAX_PLAN_SESSIONS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("response is not a JSON object")]
    NotAnObject,

    #[error("response has no {0:?} array")]
    MissingArray(&'static str),

    #[error("response has no {0:?} string")]
    MissingString(&'static str),

    #[error("no usable entries in {key:?} ({dropped} malformed)")]
    NoUsableItems { key: &'static str, dropped: usize },
}

// ---------------------------------------------------------------------------
// Envelope helpers
// ---------------------------------------------------------------------------

fn parse_object(text: &str) -> Result<Map<String, Value>, PayloadError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(PayloadError::NotAnObject),
        Err(e) => Err(PayloadError::InvalidJson(e.to_string())),
    }
}

fn take_array(map: &mut Map<String, Value>, key: &'static str) -> Result<Vec<Value>, PayloadError> {
    match map.remove(key) {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(PayloadError::MissingArray(key)),
    }
}

/// Like [`take_array`], but a missing or non-array key reads as empty.
fn take_array_or_empty(map: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match map.remove(key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn take_string(map: &mut Map<String, Value>, key: &'static str) -> Result<String, PayloadError> {
    match map.remove(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(PayloadError::MissingString(key)),
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// A non-blank title that fits the title columns.
fn title(s: Option<String>) -> Option<String> {
    non_blank(s).filter(|t| t.chars().count() <= MAX_TITLE_CHARS)
}

/// Deserialize each element on its own, keeping the first `cap` that
/// `validate` accepts. Returns the kept items and how many were dropped,
/// counting valid items past the cap.
fn collect_valid<R, T>(
    items: Vec<Value>,
    cap: usize,
    validate: impl Fn(R) -> Option<T>,
) -> (Vec<T>, usize)
where
    R: for<'de> Deserialize<'de>,
{
    let total = items.len();
    let kept: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<R>(item).ok())
        .filter_map(validate)
        .take(cap)
        .collect();
    let dropped = total - kept.len();
    (kept, dropped)
}

fn require_some<T>(
    items: Vec<T>,
    key: &'static str,
    dropped: usize,
) -> Result<Vec<T>, PayloadError> {
    if items.is_empty() {
        Err(PayloadError::NoUsableItems { key, dropped })
    } else {
        Ok(items)
    }
}

// ---------------------------------------------------------------------------
// Priority normalisation
// ---------------------------------------------------------------------------

/// Map free-form model output onto the three stored priorities.
///
/// Trims, capitalises the first letter and lowercases the rest; anything
/// that is still not `High`, `Medium` or `Low` becomes `Medium`.
pub fn normalize_priority(raw: &str) -> Priority {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    let normalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    };
    normalized.parse().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Quick-add
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawEvent {
    title: Option<String>,
    #[serde(rename = "startTimeUtc", alias = "startTimeISO")]
    start_time_utc: Option<String>,
    #[serde(rename = "durationMinutes")]
    duration_minutes: Option<Value>,
}

#[derive(Deserialize)]
struct RawTask {
    title: Option<String>,
}

/// An event extracted from free text, ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl EventDraft {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + chrono::Duration::minutes(self.duration_minutes)
    }
}

/// A task extracted from free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
}

/// Parsed `{events, tasks}` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuickAddPayload {
    pub events: Vec<EventDraft>,
    pub tasks: Vec<TaskDraft>,
    /// Elements present in the response but dropped as malformed.
    pub dropped: usize,
}

impl QuickAddPayload {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.tasks.is_empty()
    }
}

/// Parse a UTC instant that carries an explicit `Z` designator.
fn parse_utc_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if !raw.ends_with(['Z', 'z']) {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn event_minutes(raw: Option<&Value>) -> i64 {
    raw.and_then(Value::as_f64)
        .filter(|m| m.is_finite() && *m >= 1.0)
        .map_or(DEFAULT_EVENT_MINUTES, |m| (m.round() as i64).min(MAX_EVENT_MINUTES))
}

fn validate_event(raw: RawEvent) -> Option<EventDraft> {
    let title = title(raw.title)?;
    let start_time = parse_utc_instant(raw.start_time_utc.as_deref()?)?;
    Some(EventDraft {
        title,
        start_time,
        duration_minutes: event_minutes(raw.duration_minutes.as_ref()),
    })
}

/// Parse a quick-add response.
///
/// Missing `events` or `tasks` keys read as empty lists. Events without a
/// usable title or a `Z`-suffixed RFC 3339 start are dropped, as are tasks
/// without a usable title. At most [`MAX_QUICK_ADD_EVENTS`] events and
/// [`MAX_QUICK_ADD_TASKS`] tasks are kept.
pub fn parse_quick_add(text: &str) -> Result<QuickAddPayload, PayloadError> {
    let mut map = parse_object(text)?;
    let (events, dropped_events) = collect_valid(
        take_array_or_empty(&mut map, "events"),
        MAX_QUICK_ADD_EVENTS,
        validate_event,
    );
    let (tasks, dropped_tasks) = collect_valid(
        take_array_or_empty(&mut map, "tasks"),
        MAX_QUICK_ADD_TASKS,
        |raw: RawTask| title(raw.title).map(|title| TaskDraft { title }),
    );

    Ok(QuickAddPayload {
        events,
        tasks,
        dropped: dropped_events + dropped_tasks,
    })
}

// ---------------------------------------------------------------------------
// Decompose
// ---------------------------------------------------------------------------

/// Parse `{subtasks: [title, ...]}`. Non-string, blank and over-long
/// entries are dropped, as is anything past [`MAX_SUBTASKS`]; at least one
/// title must survive.
pub fn parse_subtasks(text: &str) -> Result<Vec<String>, PayloadError> {
    let mut map = parse_object(text)?;
    let items = take_array(&mut map, "subtasks")?;
    let (titles, dropped) = collect_valid(items, MAX_SUBTASKS, |raw: String| title(Some(raw)));
    require_some(titles, "subtasks", dropped)
}

// ---------------------------------------------------------------------------
// Prioritize
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    fn into_id(self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Deserialize)]
struct RawPriorityUpdate {
    id: Option<RawId>,
    priority: Option<String>,
}

/// A priority the model assigned to one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriorityUpdate {
    pub task_id: i64,
    pub priority: Priority,
}

/// Parse `{updates: [{id, priority}, ...]}`.
///
/// `id` may be a number or a numeric string. A present but unrecognised
/// priority normalises to `Medium`; an entry missing either field is
/// dropped. An empty array is accepted; a non-empty array with no usable
/// entry is not.
pub fn parse_priority_updates(text: &str) -> Result<Vec<PriorityUpdate>, PayloadError> {
    let mut map = parse_object(text)?;
    let items = take_array(&mut map, "updates")?;
    if items.is_empty() {
        return Ok(Vec::new());
    }
    // Bounded by the batch: the workflow ignores ids it did not send.
    let cap = items.len();
    let (updates, dropped) = collect_valid(items, cap, |raw: RawPriorityUpdate| {
        Some(PriorityUpdate {
            task_id: raw.id?.into_id()?,
            priority: normalize_priority(&raw.priority?),
        })
    });
    require_some(updates, "updates", dropped)
}

// ---------------------------------------------------------------------------
// Study plan
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawStudyItem {
    title: Option<String>,
    date: Option<String>,
}

/// One study session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyItem {
    pub title: String,
    pub date: NaiveDate,
}

/// Parse `{plan: [{title, date}, ...]}` with `YYYY-MM-DD` dates, keeping
/// at most [`MAX_PLAN_SESSIONS`] sessions.
pub fn parse_study_plan(text: &str) -> Result<Vec<StudyItem>, PayloadError> {
    let mut map = parse_object(text)?;
    let items = take_array(&mut map, "plan")?;
    let (plan, dropped) = collect_valid(items, MAX_PLAN_SESSIONS, |raw: RawStudyItem| {
        let title = title(raw.title)?;
        let date = NaiveDate::parse_from_str(raw.date?.trim(), "%Y-%m-%d").ok()?;
        Some(StudyItem { title, date })
    });
    require_some(plan, "plan", dropped)
}

// ---------------------------------------------------------------------------
// Email draft
// ---------------------------------------------------------------------------

/// A drafted email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
}

/// Parse `{subject, body}`; both must be non-empty strings.
pub fn parse_email_draft(text: &str) -> Result<EmailDraft, PayloadError> {
    let mut map = parse_object(text)?;
    Ok(EmailDraft {
        subject: take_string(&mut map, "subject")?,
        body: take_string(&mut map, "body")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn priority_normalisation() {
        assert_eq!(normalize_priority("high"), Priority::High);
        assert_eq!(normalize_priority("  LOW "), Priority::Low);
        assert_eq!(normalize_priority("mEdIuM"), Priority::Medium);
        assert_eq!(normalize_priority("Urgent"), Priority::Medium);
        assert_eq!(normalize_priority(""), Priority::Medium);
    }

    #[test]
    fn envelope_errors() {
        assert!(matches!(parse_subtasks("not json"), Err(PayloadError::InvalidJson(_))));
        assert_eq!(parse_subtasks("[\"a\"]"), Err(PayloadError::NotAnObject));
        assert_eq!(
            parse_subtasks("{\"steps\": [\"a\"]}"),
            Err(PayloadError::MissingArray("subtasks"))
        );
        assert_eq!(
            parse_subtasks("{\"subtasks\": \"a, b\"}"),
            Err(PayloadError::MissingArray("subtasks"))
        );
    }

    #[test]
    fn quick_add_example() {
        let text = r#"{ "events": [ { "title": "Meet Sam", "startTimeISO": "2025-10-28T18:00:00.000Z", "durationMinutes": 60 } ],
                        "tasks": [ { "title": "Prep Docs" } ] }"#;
        let payload = parse_quick_add(text).unwrap();
        assert_eq!(payload.events.len(), 1);
        let event = &payload.events[0];
        assert_eq!(event.title, "Meet Sam");
        assert_eq!(event.start_time, Utc.with_ymd_and_hms(2025, 10, 28, 18, 0, 0).unwrap());
        assert_eq!(event.end_time(), Utc.with_ymd_and_hms(2025, 10, 28, 19, 0, 0).unwrap());
        assert_eq!(payload.tasks, vec![TaskDraft { title: "Prep Docs".into() }]);
        assert_eq!(payload.dropped, 0);
    }

    #[test]
    fn quick_add_drops_bad_events() {
        let text = r#"{ "events": [
                { "title": "No start" },
                { "title": "Local time", "startTimeUtc": "2025-10-28T18:00:00-04:00" },
                { "title": "Garbage", "startTimeUtc": "next tuesday Z" },
                { "startTimeUtc": "2025-10-28T18:00:00Z" },
                "not an object",
                { "title": "Kept", "startTimeUtc": "2025-10-28T18:00:00Z", "durationMinutes": "long" }
            ], "tasks": [ { "title": "  " }, { "title": 5 }, { "title": "Real" } ] }"#;
        let payload = parse_quick_add(text).unwrap();
        assert_eq!(payload.events.len(), 1);
        assert_eq!(payload.events[0].title, "Kept");
        assert_eq!(payload.events[0].duration_minutes, DEFAULT_EVENT_MINUTES);
        assert_eq!(payload.tasks, vec![TaskDraft { title: "Real".into() }]);
        assert_eq!(payload.dropped, 7);
    }

    #[test]
    fn quick_add_duration_handling() {
        assert_eq!(event_minutes(Some(&serde_json::json!(90))), 90);
        assert_eq!(event_minutes(Some(&serde_json::json!(45.4))), 45);
        assert_eq!(event_minutes(Some(&serde_json::json!(0))), 60);
        assert_eq!(event_minutes(Some(&serde_json::json!(-30))), 60);
        assert_eq!(event_minutes(None), 60);
        assert_eq!(event_minutes(Some(&serde_json::json!(1e300))), MAX_EVENT_MINUTES);
    }

    #[test]
    fn quick_add_missing_keys_read_as_empty() {
        let payload = parse_quick_add("{}").unwrap();
        assert!(payload.is_empty());
        assert_eq!(payload.dropped, 0);

        let payload = parse_quick_add(r#"{"events": null, "tasks": "none"}"#).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn subtasks_drop_non_strings() {
        let titles = parse_subtasks(r#"{"subtasks": ["Draft outline", 3, "", " Write intro "]}"#).unwrap();
        assert_eq!(titles, vec!["Draft outline", "Write intro"]);
    }

    #[test]
    fn subtasks_are_capped() {
        let many: Vec<String> = (1..=500).map(|i| format!("Step {i}")).collect();
        let text = serde_json::json!({ "subtasks": many }).to_string();
        let titles = parse_subtasks(&text).unwrap();
        assert_eq!(titles.len(), MAX_SUBTASKS);
        assert_eq!(titles[0], "Step 1");
        assert_eq!(titles[MAX_SUBTASKS - 1], "Step 5");
    }

    #[test]
    fn over_long_titles_are_dropped() {
        let long = "x".repeat(MAX_TITLE_CHARS + 1);
        let exact = "y".repeat(MAX_TITLE_CHARS);
        let text = serde_json::json!({ "subtasks": [long.clone(), exact.clone()] }).to_string();
        assert_eq!(parse_subtasks(&text).unwrap(), vec![exact.clone()]);

        let text = serde_json::json!({
            "events": [{ "title": long.clone(), "startTimeUtc": "2025-10-28T18:00:00Z" }],
            "tasks": [{ "title": long.clone() }, { "title": exact }],
        })
        .to_string();
        let payload = parse_quick_add(&text).unwrap();
        assert!(payload.events.is_empty());
        assert_eq!(payload.tasks.len(), 1);
        assert_eq!(payload.dropped, 2);

        let text = serde_json::json!({ "plan": [{ "title": long, "date": "2025-11-02" }] }).to_string();
        assert_eq!(
            parse_study_plan(&text),
            Err(PayloadError::NoUsableItems { key: "plan", dropped: 1 })
        );
    }

    #[test]
    fn quick_add_items_past_the_cap_count_as_dropped() {
        let events: Vec<_> = (0..MAX_QUICK_ADD_EVENTS + 3)
            .map(|i| serde_json::json!({ "title": format!("Event {i}"), "startTimeUtc": "2025-10-28T18:00:00Z" }))
            .collect();
        let tasks: Vec<_> = (0..MAX_QUICK_ADD_TASKS + 2)
            .map(|i| serde_json::json!({ "title": format!("Task {i}") }))
            .collect();
        let text = serde_json::json!({ "events": events, "tasks": tasks }).to_string();
        let payload = parse_quick_add(&text).unwrap();
        assert_eq!(payload.events.len(), MAX_QUICK_ADD_EVENTS);
        assert_eq!(payload.tasks.len(), MAX_QUICK_ADD_TASKS);
        assert_eq!(payload.dropped, 5);
    }

    #[test]
    fn study_plan_is_capped() {
        let plan: Vec<_> = (0..MAX_PLAN_SESSIONS * 2)
            .map(|i| serde_json::json!({ "title": format!("Session {i}"), "date": "2025-11-02" }))
            .collect();
        let text = serde_json::json!({ "plan": plan }).to_string();
        assert_eq!(parse_study_plan(&text).unwrap().len(), MAX_PLAN_SESSIONS);
    }

    #[test]
    fn subtasks_need_at_least_one_title() {
        assert_eq!(
            parse_subtasks(r#"{"subtasks": [null, ""]}"#),
            Err(PayloadError::NoUsableItems {
                key: "subtasks",
                dropped: 2
            })
        );
        assert_eq!(
            parse_subtasks(r#"{"subtasks": []}"#),
            Err(PayloadError::NoUsableItems {
                key: "subtasks",
                dropped: 0
            })
        );
    }

    #[test]
    fn priority_updates_accept_numeric_and_string_ids() {
        let updates = parse_priority_updates(
            r#"{"updates": [
                {"id": 4, "priority": "high"},
                {"id": "7", "priority": "Urgent"},
                {"id": "seven", "priority": "Low"},
                {"id": 9},
                {"priority": "Low"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            updates,
            vec![
                PriorityUpdate { task_id: 4, priority: Priority::High },
                PriorityUpdate { task_id: 7, priority: Priority::Medium },
            ]
        );
    }

    #[test]
    fn priority_updates_empty_array_is_fine() {
        assert!(parse_priority_updates(r#"{"updates": []}"#).unwrap().is_empty());
    }

    #[test]
    fn study_plan_drops_bad_dates() {
        let plan = parse_study_plan(
            r#"{"plan": [
                {"title": "Review chapter 1", "date": "2025-11-02"},
                {"title": "Practice exam", "date": "Nov 3"},
                {"title": "", "date": "2025-11-04"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            plan,
            vec![StudyItem {
                title: "Review chapter 1".into(),
                date: NaiveDate::from_ymd_opt(2025, 11, 2).unwrap(),
            }]
        );
    }

    #[test]
    fn email_draft_requires_both_fields() {
        let draft = parse_email_draft(r#"{"subject": "Hi", "body": "Hello there."}"#).unwrap();
        assert_eq!(draft.subject, "Hi");
        assert_eq!(
            parse_email_draft(r#"{"subject": "Hi"}"#),
            Err(PayloadError::MissingString("body"))
        );
    }
}
