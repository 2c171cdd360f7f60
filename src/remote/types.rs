//! Value objects returned by the remote task service.
//!
//! These mirror the Todoist API v1 JSON shapes closely enough for serde to
//! decode them directly. They are transient copies: nothing here is written
//! to disk.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Colour token used when the service omits one.
pub const DEFAULT_COLOR: &str = "charcoal";

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn default_priority() -> u8 {
    1
}

/// Accepts ids encoded either as JSON strings or numbers (the sync endpoint
/// has used both over time).
fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/// Due-date descriptor attached to a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Due {
    /// `YYYY-MM-DD` for all-day tasks, `YYYY-MM-DDTHH:MM:SS` for floating
    /// times, or a full UTC instant when the task has a fixed timezone.
    pub date: String,
    #[serde(default)]
    pub string: String,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub timezone: Option<String>,
    /// Older payloads carry the time part here instead of in `date`.
    #[serde(default)]
    pub datetime: Option<String>,
}

impl Due {
    fn raw(&self) -> &str {
        self.datetime.as_deref().unwrap_or(&self.date)
    }

    /// Resolves the calendar date this task is due on, as seen from `offset`.
    ///
    /// Floating dates and times are taken as written; instants with an
    /// explicit zone are shifted into `offset` first.
    pub fn resolve_date(&self, offset: FixedOffset) -> Option<NaiveDate> {
        let raw = self.raw();
        if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
            return Some(instant.with_timezone(&offset).date_naive());
        }
        raw.get(..10)
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
    }

    /// Time of day, if the due descriptor carries one.
    pub fn resolve_time(&self, offset: FixedOffset) -> Option<NaiveTime> {
        let raw = self.raw();
        if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
            return Some(instant.with_timezone(&offset).time());
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
            .ok()
            .map(|dt| dt.time())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Task {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub due: Option<Due>,
    /// 1 (normal) through 4 (urgent).
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default, alias = "is_completed")]
    pub checked: bool,
    #[serde(default)]
    pub added_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Task {
    pub fn due_date(&self, offset: FixedOffset) -> Option<NaiveDate> {
        self.due.as_ref().and_then(|d| d.resolve_date(offset))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Project {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Label {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
}

/// A saved filter defined on the server. Read-only from this client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Filter {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    pub query: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Comment {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub posted_at: Option<String>,
}

/// One page of a cursor-paginated listing.
#[derive(Deserialize, Debug)]
pub(crate) struct Page<T> {
    #[serde(default = "Vec::new", alias = "items")]
    pub results: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}
