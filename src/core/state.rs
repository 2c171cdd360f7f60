//! # Application State
//!
//! Core business state for tuidoist. This module contains domain logic only -
//! no TUI-specific types. Presentation state lives in the `tui` module.
//!
//! ```text
//! App
//! ├── filter: LogicalFilter         // active selection
//! ├── project: Option<String>       // active project id (None = all projects)
//! ├── saved_filters: Vec<String>    // names of server-side filters, for cycling
//! ├── tasks: Vec<Task>              // last applied task list
//! ├── selected: usize               // cursor into tasks
//! ├── load_ticket: u64              // newest task-list request issued
//! ├── pending_delete: Option<..>    // task awaiting a y/n answer
//! ├── show_details: bool            // detail pane visible
//! ├── comments: Option<..>          // comments of the task shown in the pane
//! ├── is_loading: bool              // waiting for the service
//! ├── status_message: String        // status bar text
//! ├── warnings: Vec<String>         // stale-cache notices from the last load
//! └── error: Option<String>         // fatal error (bad token, retired API)
//! ```
//!
//! State changes only happen through `update(state, action)` in action.rs.
//! This keeps things predictable, so no surprise mutations.

use crate::core::query::LogicalFilter;
use crate::remote::{Comment, Task};

/// Comments loaded for one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskComments {
    pub task_id: String,
    pub comments: Vec<Comment>,
}

/// A delete the user still has to confirm.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDelete {
    pub task_id: String,
    pub content: String,
}

pub struct App {
    pub filter: LogicalFilter,
    pub project: Option<String>,
    pub saved_filters: Vec<String>,
    pub tasks: Vec<Task>,
    pub selected: usize,
    /// Only the task list answering this ticket is applied.
    pub load_ticket: u64,
    pub pending_delete: Option<PendingDelete>,
    pub show_details: bool,
    pub comments: Option<TaskComments>,
    /// Only comments answering this ticket are applied.
    pub comments_ticket: u64,
    pub is_loading: bool,
    pub status_message: String,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl App {
    pub fn new(filter: LogicalFilter) -> Self {
        Self {
            filter,
            project: None,
            saved_filters: Vec::new(),
            tasks: Vec::new(),
            selected: 0,
            load_ticket: 0,
            pending_delete: None,
            show_details: true,
            comments: None,
            comments_ticket: 0,
            is_loading: false,
            status_message: String::from("Loading…"),
            warnings: Vec::new(),
            error: None,
        }
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.tasks.get(self.selected)
    }

    /// Comments for the selected task, once they have arrived.
    pub fn selected_comments(&self) -> Option<&[Comment]> {
        let task = self.selected_task()?;
        self.comments
            .as_ref()
            .filter(|c| c.task_id == task.id)
            .map(|c| c.comments.as_slice())
    }

    /// Filter that follows the active one when cycling:
    /// built-ins first, then saved filters, then back to the start.
    pub fn next_filter(&self) -> LogicalFilter {
        let cycle: Vec<LogicalFilter> = LogicalFilter::BUILT_INS
            .into_iter()
            .chain(self.saved_filters.iter().cloned().map(LogicalFilter::Named))
            .collect();
        let current = match &self.filter {
            LogicalFilter::All { .. } => LogicalFilter::All {
                include_completed: false,
            },
            other => other.clone(),
        };
        let next = cycle
            .iter()
            .position(|f| *f == current)
            .map_or(0, |i| (i + 1) % cycle.len());
        cycle[next].clone()
    }

    pub(crate) fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.tasks.len().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_new_defaults() {
        let app = App::new(LogicalFilter::Today);
        assert_eq!(app.filter, LogicalFilter::Today);
        assert!(!app.is_loading);
        assert!(app.selected_task().is_none());
        assert_eq!(app.load_ticket, 0);
        assert!(app.project.is_none());
        assert!(app.show_details);
        assert!(app.pending_delete.is_none());
    }

    #[test]
    fn test_comments_only_shown_for_their_task() {
        use crate::test_support::task;

        let mut app = App::new(LogicalFilter::Today);
        app.tasks = vec![task("a", "A", None), task("b", "B", None)];
        app.comments = Some(TaskComments {
            task_id: "b".to_string(),
            comments: Vec::new(),
        });
        assert!(app.selected_comments().is_none());
        app.selected = 1;
        assert_eq!(app.selected_comments().map(<[Comment]>::len), Some(0));
    }

    #[test]
    fn test_filter_cycle_visits_saved_filters_and_wraps() {
        let mut app = App::new(LogicalFilter::Overdue);
        app.saved_filters = vec!["Work focus".to_string()];

        app.filter = app.next_filter();
        assert_eq!(
            app.filter,
            LogicalFilter::All {
                include_completed: false
            }
        );
        app.filter = app.next_filter();
        assert_eq!(app.filter, LogicalFilter::Named("Work focus".to_string()));
        app.filter = app.next_filter();
        assert_eq!(app.filter, LogicalFilter::Today);
    }

    #[test]
    fn test_history_view_cycles_like_all() {
        let app = App::new(LogicalFilter::All {
            include_completed: true,
        });
        assert_eq!(app.next_filter(), LogicalFilter::Today);
    }

    #[test]
    fn test_unknown_named_filter_restarts_cycle() {
        let app = App::new(LogicalFilter::Named("Gone".to_string()));
        assert_eq!(app.next_filter(), LogicalFilter::Today);
    }
}
