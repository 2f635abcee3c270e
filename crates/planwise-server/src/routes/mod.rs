//! HTTP handlers, one module per resource.
//!
//! Handlers take extractor results rather than bare extractors so that a
//! malformed body, query or path answers with the same `{"message": ...}`
//! shape as every other error.

pub mod accounts;
pub mod ai;
pub mod analytics;
pub mod events;
pub mod reminders;
pub mod sharing;
pub mod tasks;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::serve_cmd::AppError;

/// `?userId=` on list endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    #[serde(alias = "user_id")]
    pub user_id: Option<i64>,
}

impl UserQuery {
    pub fn require(&self) -> Result<i64, AppError> {
        self.user_id
            .ok_or_else(|| AppError::bad_request("User ID is required."))
    }
}

/// Trimmed, non-empty text or `None`.
pub(crate) fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Wall-clock formats accepted in addition to RFC 3339. Read as UTC.
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Parse an instant sent by a client: RFC 3339 with any offset, or a bare
/// date and time taken to be UTC.
pub(crate) fn parse_instant(field: &str, raw: &str) -> Result<DateTime<Utc>, AppError> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            AppError::bad_request(format!(
                "{field} must be RFC 3339 or YYYY-MM-DD HH:MM, got {raw:?}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn instants_accept_offsets_and_naive_utc() {
        let expected = Utc.with_ymd_and_hms(2025, 10, 22, 18, 0, 0).unwrap();
        assert_eq!(parse_instant("t", "2025-10-22T18:00:00Z").unwrap(), expected);
        assert_eq!(parse_instant("t", "2025-10-22T14:00:00-04:00").unwrap(), expected);
        assert_eq!(parse_instant("t", "2025-10-22 18:00").unwrap(), expected);
        assert_eq!(parse_instant("t", "2025-10-22T18:00").unwrap(), expected);
        assert!(parse_instant("t", "tomorrow").is_err());
    }

    #[test]
    fn present_rejects_blank() {
        assert_eq!(present(Some("  hi ")), Some("hi"));
        assert_eq!(present(Some("   ")), None);
        assert_eq!(present(None), None);
    }

    #[test]
    fn user_query_requires_id() {
        assert!(UserQuery { user_id: None }.require().is_err());
        assert_eq!(UserQuery { user_id: Some(4) }.require().unwrap(), 4);
    }
}
