//! # Query Translation
//!
//! Turns a [`LogicalFilter`] (what the user picked) into a
//! [`QueryDescriptor`] (what to fetch and how to narrow it locally).
//!
//! Built-in filters are evaluated client-side against each task's due date,
//! resolved in a configurable [`TimeBasis`]. Saved filters are sent to the
//! service verbatim; their query language is never reinterpreted here.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, FixedOffset, Local, NaiveDate, Utc};

use crate::remote::{Filter, ServiceError, Task};

/// How far back the completed-task history reaches.
pub const HISTORY_DAYS: u64 = 30;

/// A named selection criterion, independent of the service's own saved filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalFilter {
    Today,
    ThisWeek,
    Overdue,
    All { include_completed: bool },
    /// A saved filter, referenced by name.
    Named(String),
}

impl LogicalFilter {
    pub const BUILT_INS: [LogicalFilter; 4] = [
        LogicalFilter::Today,
        LogicalFilter::ThisWeek,
        LogicalFilter::Overdue,
        LogicalFilter::All {
            include_completed: false,
        },
    ];

    pub fn is_named(&self) -> bool {
        matches!(self, LogicalFilter::Named(_))
    }
}

impl fmt::Display for LogicalFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalFilter::Today => write!(f, "Today"),
            LogicalFilter::ThisWeek => write!(f, "Next 7 days"),
            LogicalFilter::Overdue => write!(f, "Overdue"),
            LogicalFilter::All {
                include_completed: false,
            } => write!(f, "All tasks"),
            LogicalFilter::All {
                include_completed: true,
            } => write!(f, "All tasks + history"),
            LogicalFilter::Named(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for LogicalFilter {
    type Err = String;

    /// Parses CLI/config spellings. Anything that is not a built-in keyword
    /// is taken as the name of a saved filter.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("filter name must not be empty".to_string());
        }
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "today" => LogicalFilter::Today,
            "this_week" | "this-week" | "week" | "7days" | "7_days" => LogicalFilter::ThisWeek,
            "overdue" => LogicalFilter::Overdue,
            "all" => LogicalFilter::All {
                include_completed: false,
            },
            "history" | "all+completed" => LogicalFilter::All {
                include_completed: true,
            },
            _ => LogicalFilter::Named(trimmed.to_string()),
        })
    }
}

/// Which clock defines "today" and the calendar date of a due instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBasis {
    /// The process's local timezone.
    Local,
    /// A fixed UTC offset, typically the remote account's.
    Fixed(FixedOffset),
}

impl TimeBasis {
    pub fn offset_at(&self, now: DateTime<Utc>) -> FixedOffset {
        match self {
            TimeBasis::Local => *now.with_timezone(&Local).offset(),
            TimeBasis::Fixed(offset) => *offset,
        }
    }

    pub fn today_at(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset_at(now)).date_naive()
    }
}

/// Inclusive date range a due date must fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateWindow {
    On(NaiveDate),
    Between { start: NaiveDate, end: NaiveDate },
    Before(NaiveDate),
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        match *self {
            DateWindow::On(day) => date == day,
            DateWindow::Between { start, end } => start <= date && date <= end,
            DateWindow::Before(day) => date < day,
        }
    }
}

/// Concrete fetch parameters for one logical filter.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    /// Passed to `list_tasks` as-is.
    pub server_query: Option<String>,
    /// Client-side predicate over resolved due dates.
    pub window: Option<DateWindow>,
    /// Also fetch recently completed tasks.
    pub include_completed: bool,
    /// Offset used to resolve each task's due date.
    pub offset: FixedOffset,
    /// Only tasks in this project, when set.
    pub project_id: Option<String>,
}

impl QueryDescriptor {
    /// Narrows the descriptor to one project (`None` keeps every project).
    pub fn in_project(mut self, project_id: Option<String>) -> Self {
        self.project_id = project_id;
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        if task.checked && !self.include_completed {
            return false;
        }
        if self
            .project_id
            .as_ref()
            .is_some_and(|project| *project != task.project_id)
        {
            return false;
        }
        match self.window {
            None => true,
            Some(window) => task
                .due_date(self.offset)
                .is_some_and(|date| window.contains(date)),
        }
    }

    pub fn apply(&self, tasks: Vec<Task>) -> Vec<Task> {
        tasks.into_iter().filter(|t| self.matches(t)).collect()
    }
}

pub struct QueryTranslator {
    basis: TimeBasis,
}

impl QueryTranslator {
    pub fn new(basis: TimeBasis) -> Self {
        Self { basis }
    }

    pub fn basis(&self) -> TimeBasis {
        self.basis
    }

    /// Resolves `filter` as of `now`. `saved` is only consulted for
    /// [`LogicalFilter::Named`]; an unknown name is `NotFound`.
    pub fn resolve(
        &self,
        filter: &LogicalFilter,
        saved: &[Filter],
        now: DateTime<Utc>,
    ) -> Result<QueryDescriptor, ServiceError> {
        let offset = self.basis.offset_at(now);
        let today = self.basis.today_at(now);

        let (server_query, window, include_completed) = match filter {
            LogicalFilter::Today => (None, Some(DateWindow::On(today)), false),
            LogicalFilter::ThisWeek => {
                let end = today.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX);
                (None, Some(DateWindow::Between { start: today, end }), false)
            }
            LogicalFilter::Overdue => (None, Some(DateWindow::Before(today)), false),
            LogicalFilter::All { include_completed } => (None, None, *include_completed),
            LogicalFilter::Named(name) => {
                let stored = saved
                    .iter()
                    .find(|f| f.name.eq_ignore_ascii_case(name))
                    .ok_or_else(|| ServiceError::NotFound(format!("saved filter '{name}'")))?;
                (Some(stored.query.clone()), None, false)
            }
        };

        Ok(QueryDescriptor {
            server_query,
            window,
            include_completed,
            offset,
            project_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::ErrorKind;
    use crate::test_support::{filter, task};
    use chrono::TimeZone;

    fn utc_basis() -> QueryTranslator {
        QueryTranslator::new(TimeBasis::Fixed(FixedOffset::east_opt(0).unwrap()))
    }

    /// Noon UTC on the given day.
    fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_today_selects_only_tasks_due_today() {
        let tasks = vec![
            task("yesterday", "a", Some("2025-06-15")),
            task("today", "b", Some("2025-06-16")),
            task("tomorrow", "c", Some("2025-06-17")),
            task("undated", "d", None),
        ];
        let query = utc_basis()
            .resolve(&LogicalFilter::Today, &[], noon(2025, 6, 16))
            .unwrap();

        assert_eq!(query.server_query, None);
        assert_eq!(ids(&query.apply(tasks)), vec!["today"]);
    }

    #[test]
    fn test_this_week_is_seven_days_inclusive() {
        let tasks = vec![
            task("before", "a", Some("2025-06-15")),
            task("start", "b", Some("2025-06-16")),
            task("last", "c", Some("2025-06-22")),
            task("after", "d", Some("2025-06-23")),
        ];
        let query = utc_basis()
            .resolve(&LogicalFilter::ThisWeek, &[], noon(2025, 6, 16))
            .unwrap();

        assert_eq!(ids(&query.apply(tasks)), vec!["start", "last"]);
    }

    #[test]
    fn test_overdue_excludes_completed_tasks() {
        let mut done = task("done", "a", Some("2025-06-01"));
        done.checked = true;
        let tasks = vec![
            done,
            task("late", "b", Some("2025-06-10")),
            task("today", "c", Some("2025-06-16")),
        ];
        let query = utc_basis()
            .resolve(&LogicalFilter::Overdue, &[], noon(2025, 6, 16))
            .unwrap();

        assert_eq!(ids(&query.apply(tasks)), vec!["late"]);
    }

    #[test]
    fn test_all_hides_completed_unless_requested() {
        let mut done = task("done", "a", None);
        done.checked = true;
        let tasks = vec![done, task("open", "b", None)];
        let translator = utc_basis();

        let active = translator
            .resolve(
                &LogicalFilter::All {
                    include_completed: false,
                },
                &[],
                noon(2025, 6, 16),
            )
            .unwrap();
        assert_eq!(ids(&active.apply(tasks.clone())), vec!["open"]);

        let history = translator
            .resolve(
                &LogicalFilter::All {
                    include_completed: true,
                },
                &[],
                noon(2025, 6, 16),
            )
            .unwrap();
        assert!(history.include_completed);
        assert_eq!(ids(&history.apply(tasks)), vec!["done", "open"]);
    }

    #[test]
    fn test_project_scope_narrows_any_filter() {
        let mut elsewhere = task("elsewhere", "a", Some("2025-06-16"));
        elsewhere.project_id = "p2".to_string();
        let tasks = vec![elsewhere, task("inbox", "b", Some("2025-06-16"))];

        let query = utc_basis()
            .resolve(&LogicalFilter::Today, &[], noon(2025, 6, 16))
            .unwrap();
        assert_eq!(query.project_id, None);
        assert_eq!(ids(&query.clone().apply(tasks.clone())), vec!["elsewhere", "inbox"]);

        let scoped = query.in_project(Some("p2".to_string()));
        assert_eq!(ids(&scoped.apply(tasks)), vec!["elsewhere"]);
    }

    #[test]
    fn test_named_filter_passes_query_verbatim() {
        let saved = vec![filter("f1", "Work focus", "(#Work | @office) & p1 & !subtask")];
        let query = utc_basis()
            .resolve(
                &LogicalFilter::Named("work FOCUS".to_string()),
                &saved,
                noon(2025, 6, 16),
            )
            .unwrap();

        assert_eq!(
            query.server_query.as_deref(),
            Some("(#Work | @office) & p1 & !subtask")
        );
        assert_eq!(query.window, None);
    }

    #[test]
    fn test_unknown_named_filter_is_not_found() {
        let err = utc_basis()
            .resolve(&LogicalFilter::Named("Nope".to_string()), &[], noon(2025, 6, 16))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_basis_decides_what_today_is() {
        // 23:30 UTC on the 16th is already the 17th in UTC+9.
        let now = Utc.with_ymd_and_hms(2025, 6, 16, 23, 30, 0).unwrap();
        let tokyo = QueryTranslator::new(TimeBasis::Fixed(FixedOffset::east_opt(9 * 3600).unwrap()));
        let tasks = vec![
            task("16th", "a", Some("2025-06-16")),
            task("17th", "b", Some("2025-06-17")),
        ];

        let utc_today = utc_basis().resolve(&LogicalFilter::Today, &[], now).unwrap();
        let tokyo_today = tokyo.resolve(&LogicalFilter::Today, &[], now).unwrap();

        assert_eq!(ids(&utc_today.apply(tasks.clone())), vec!["16th"]);
        assert_eq!(ids(&tokyo_today.apply(tasks)), vec!["17th"]);
    }

    #[test]
    fn test_due_instants_are_shifted_into_basis() {
        let now = Utc.with_ymd_and_hms(2025, 6, 17, 3, 0, 0).unwrap();
        let tokyo = QueryTranslator::new(TimeBasis::Fixed(FixedOffset::east_opt(9 * 3600).unwrap()));
        // 20:00 UTC on the 16th is 05:00 on the 17th in Tokyo.
        let tasks = vec![task("fixed", "a", Some("2025-06-16T20:00:00Z"))];

        let query = tokyo.resolve(&LogicalFilter::Today, &[], now).unwrap();
        assert_eq!(ids(&query.apply(tasks)), vec!["fixed"]);
    }

    #[test]
    fn test_parse_filter_names() {
        assert_eq!("today".parse::<LogicalFilter>(), Ok(LogicalFilter::Today));
        assert_eq!("This-Week".parse::<LogicalFilter>(), Ok(LogicalFilter::ThisWeek));
        assert_eq!("overdue".parse::<LogicalFilter>(), Ok(LogicalFilter::Overdue));
        assert_eq!(
            "history".parse::<LogicalFilter>(),
            Ok(LogicalFilter::All {
                include_completed: true
            })
        );
        assert_eq!(
            "Work focus".parse::<LogicalFilter>(),
            Ok(LogicalFilter::Named("Work focus".to_string()))
        );
        assert!("  ".parse::<LogicalFilter>().is_err());
    }

    #[test]
    fn test_date_window_bounds() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 6, day).unwrap();
        assert!(DateWindow::Before(d(16)).contains(d(15)));
        assert!(!DateWindow::Before(d(16)).contains(d(16)));
        let week = DateWindow::Between { start: d(16), end: d(22) };
        assert!(week.contains(d(16)) && week.contains(d(22)));
        assert!(!week.contains(d(23)));
    }
}
