//! # Actions
//!
//! Everything that can happen in tuidoist becomes an `Action`.
//! User presses `c`? That's `Action::CompleteSelected`.
//! Service responds? That's `Action::TasksLoaded { .. }`.
//!
//! The `update()` function takes the current state and an action,
//! mutates it, and returns an [`Effect`] describing the I/O the adapter
//! should start. No side effects here. I/O happens elsewhere.
//!
//! ```text
//! State + Action  →  update()  →  New State + Effect
//! ```

use log::{debug, info, warn};

use crate::core::query::LogicalFilter;
use crate::core::state::{App, PendingDelete, TaskComments};
use crate::core::workspace::TaskList;
use crate::remote::{Comment, ErrorKind, ServiceError};

/// A change the adapter should send to the service.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Complete(String),
    Delete(String),
    SetPriority(String, u8),
    QuickAdd(String),
    /// Entry text parsed locally for `#project`, `@label` and a due phrase.
    AddParsed(String),
    Edit(String, String),
    SetLabels(String, Vec<String>),
    AddComment(String, String),
}

impl Mutation {
    fn describe(&self) -> &'static str {
        match self {
            Mutation::Complete(_) => "Completed",
            Mutation::Delete(_) => "Deleted",
            Mutation::SetPriority(..) => "Priority set",
            Mutation::QuickAdd(_) | Mutation::AddParsed(_) => "Added",
            Mutation::Edit(..) => "Updated",
            Mutation::SetLabels(..) => "Labels updated",
            Mutation::AddComment(..) => "Comment added",
        }
    }
}

#[derive(Debug)]
pub enum Action {
    Quit,
    MoveUp,
    MoveDown,
    CycleFilter,
    ToggleHistory,
    /// Reload the task list; `force` also bypasses the catalog TTL.
    Refresh { force: bool },
    TasksLoaded {
        ticket: u64,
        result: Result<TaskList, ServiceError>,
    },
    /// Saved filter names and stale notices from a catalog refresh.
    CatalogLoaded(Result<(Vec<String>, Vec<String>), ServiceError>),
    /// Show only tasks from this project (`None` = all projects).
    SetProject(Option<String>),
    ToggleDetails,
    CommentsLoaded {
        ticket: u64,
        task_id: String,
        result: Result<Vec<Comment>, ServiceError>,
    },
    CompleteSelected,
    /// Asks for confirmation; nothing is sent until [`Action::ConfirmDelete`].
    DeleteSelected,
    ConfirmDelete(bool),
    SetPriority(u8),
    QuickAdd(String),
    AddParsed(String),
    EditSelected(String),
    /// Comma- or space-separated label names.
    SetLabels(String),
    AddComment(String),
    MutationDone {
        mutation: Mutation,
        result: Result<(), ServiceError>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    Quit,
    LoadTasks {
        ticket: u64,
        filter: LogicalFilter,
        project: Option<String>,
        force: bool,
    },
    LoadComments {
        ticket: u64,
        task_id: String,
    },
    Mutate(Mutation),
}

pub fn update(app: &mut App, action: Action) -> Effect {
    match action {
        Action::Quit => Effect::Quit,
        Action::MoveUp => {
            app.selected = app.selected.saturating_sub(1);
            load_comments(app)
        }
        Action::MoveDown => {
            if app.selected + 1 < app.tasks.len() {
                app.selected += 1;
            }
            load_comments(app)
        }
        Action::CycleFilter => {
            app.filter = app.next_filter();
            app.selected = 0;
            start_load(app, false)
        }
        Action::ToggleHistory => {
            app.filter = match app.filter {
                LogicalFilter::All { include_completed } => LogicalFilter::All {
                    include_completed: !include_completed,
                },
                _ => LogicalFilter::All {
                    include_completed: true,
                },
            };
            app.selected = 0;
            start_load(app, false)
        }
        Action::Refresh { force } => start_load(app, force),
        Action::TasksLoaded { ticket, result } => {
            if ticket != app.load_ticket {
                debug!(
                    "Discarding task list for ticket {} (latest {})",
                    ticket, app.load_ticket
                );
                return Effect::None;
            }
            app.is_loading = false;
            match result {
                Ok(list) => {
                    app.status_message = format!("{}: {} tasks", list.filter, list.tasks.len());
                    app.warnings = list.warnings.iter().map(ToString::to_string).collect();
                    app.tasks = list.tasks;
                    app.clamp_selection();
                    // Comments may have changed along with the list.
                    app.comments = None;
                    load_comments(app)
                }
                Err(e) => {
                    report_error(app, &e);
                    Effect::None
                }
            }
        }
        Action::SetProject(project) => {
            app.project = project;
            app.selected = 0;
            start_load(app, false)
        }
        Action::ToggleDetails => {
            app.show_details = !app.show_details;
            load_comments(app)
        }
        Action::CommentsLoaded {
            ticket,
            task_id,
            result,
        } => {
            if ticket != app.comments_ticket {
                debug!(
                    "Discarding comments for ticket {} (latest {})",
                    ticket, app.comments_ticket
                );
                return Effect::None;
            }
            match result {
                Ok(comments) => app.comments = Some(TaskComments { task_id, comments }),
                Err(e) => report_error(app, &e),
            }
            Effect::None
        }
        Action::CatalogLoaded(result) => {
            match result {
                Ok((filters, warnings)) => {
                    app.saved_filters = filters;
                    app.warnings.extend(warnings);
                }
                Err(e) => report_error(app, &e),
            }
            Effect::None
        }
        Action::CompleteSelected => selected_mutation(app, Mutation::Complete),
        Action::DeleteSelected => {
            let pending = app.selected_task().map(|task| PendingDelete {
                task_id: task.id.clone(),
                content: task.content.clone(),
            });
            app.status_message = match &pending {
                Some(p) => format!("Delete \"{}\"? (y/n)", p.content),
                None => "No task selected".to_string(),
            };
            app.pending_delete = pending;
            Effect::None
        }
        Action::ConfirmDelete(confirmed) => match app.pending_delete.take() {
            Some(pending) if confirmed => {
                app.is_loading = true;
                Effect::Mutate(Mutation::Delete(pending.task_id))
            }
            Some(_) => {
                app.status_message = "Delete cancelled".to_string();
                Effect::None
            }
            None => Effect::None,
        },
        Action::SetPriority(priority) => {
            selected_mutation(app, |id| Mutation::SetPriority(id, priority))
        }
        Action::QuickAdd(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Effect::None;
            }
            app.is_loading = true;
            Effect::Mutate(Mutation::QuickAdd(text.to_string()))
        }
        Action::AddParsed(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Effect::None;
            }
            app.is_loading = true;
            Effect::Mutate(Mutation::AddParsed(text.to_string()))
        }
        Action::EditSelected(text) => {
            if text.trim().is_empty() {
                return Effect::None;
            }
            selected_mutation(app, |id| Mutation::Edit(id, text))
        }
        Action::SetLabels(text) => {
            let names: Vec<String> = text
                .split([',', ' '])
                .map(|s| s.trim().trim_start_matches('@'))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            selected_mutation(app, |id| Mutation::SetLabels(id, names))
        }
        Action::AddComment(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Effect::None;
            }
            selected_mutation(app, |id| Mutation::AddComment(id, text.to_string()))
        }
        Action::MutationDone { mutation, result } => match result {
            Ok(()) => {
                info!("Mutation applied: {:?}", mutation);
                let effect = start_load(app, false);
                app.status_message = mutation.describe().to_string();
                effect
            }
            Err(e) => {
                app.is_loading = false;
                report_error(app, &e);
                Effect::None
            }
        },
    }
}

fn start_load(app: &mut App, force: bool) -> Effect {
    app.load_ticket += 1;
    app.is_loading = true;
    app.status_message = format!("Loading {}…", app.filter);
    Effect::LoadTasks {
        ticket: app.load_ticket,
        filter: app.filter.clone(),
        project: app.project.clone(),
        force,
    }
}

/// Requests comments for the selected task when the detail pane needs them.
fn load_comments(app: &mut App) -> Effect {
    if !app.show_details || app.selected_comments().is_some() {
        return Effect::None;
    }
    let Some(task_id) = app.selected_task().map(|t| t.id.clone()) else {
        return Effect::None;
    };
    app.comments_ticket += 1;
    Effect::LoadComments {
        ticket: app.comments_ticket,
        task_id,
    }
}

fn selected_mutation(app: &mut App, build: impl FnOnce(String) -> Mutation) -> Effect {
    match app.selected_task() {
        Some(task) => {
            let mutation = build(task.id.clone());
            app.is_loading = true;
            Effect::Mutate(mutation)
        }
        None => {
            app.status_message = "No task selected".to_string();
            Effect::None
        }
    }
}

fn report_error(app: &mut App, err: &ServiceError) {
    warn!("Service error: {}", err);
    match err.kind() {
        ErrorKind::Authentication | ErrorKind::DeprecatedEndpoint => {
            app.error = Some(err.to_string());
        }
        _ => app.status_message = format!("Error: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::QueryDescriptor;
    use crate::test_support::task;
    use chrono::FixedOffset;

    fn list(filter: LogicalFilter, ids: &[&str]) -> TaskList {
        TaskList {
            filter,
            tasks: ids.iter().map(|id| task(id, id, None)).collect(),
            descriptor: QueryDescriptor {
                server_query: None,
                window: None,
                include_completed: false,
                offset: FixedOffset::east_opt(0).unwrap(),
                project_id: None,
            },
            warnings: Vec::new(),
        }
    }

    fn loaded(app: &mut App, ids: &[&str]) {
        let ticket = match update(app, Action::Refresh { force: false }) {
            Effect::LoadTasks { ticket, .. } => ticket,
            other => panic!("expected load, got {other:?}"),
        };
        update(
            app,
            Action::TasksLoaded {
                ticket,
                result: Ok(list(app.filter.clone(), ids)),
            },
        );
    }

    #[test]
    fn test_stale_task_list_is_discarded() {
        let mut app = App::new(LogicalFilter::Today);
        let first = update(&mut app, Action::Refresh { force: false });
        let second = update(&mut app, Action::CycleFilter);
        let (Effect::LoadTasks { ticket: old, .. }, Effect::LoadTasks { ticket: new, .. }) =
            (first, second)
        else {
            panic!("both actions should load");
        };

        update(
            &mut app,
            Action::TasksLoaded {
                ticket: new,
                result: Ok(list(LogicalFilter::ThisWeek, &["week"])),
            },
        );
        update(
            &mut app,
            Action::TasksLoaded {
                ticket: old,
                result: Ok(list(LogicalFilter::Today, &["today"])),
            },
        );

        assert_eq!(app.tasks[0].id, "week");
        assert!(!app.is_loading);
    }

    #[test]
    fn test_selection_stays_in_bounds() {
        let mut app = App::new(LogicalFilter::Today);
        loaded(&mut app, &["a", "b"]);
        update(&mut app, Action::MoveDown);
        update(&mut app, Action::MoveDown);
        assert_eq!(app.selected, 1);
        update(&mut app, Action::MoveUp);
        update(&mut app, Action::MoveUp);
        assert_eq!(app.selected, 0);

        update(&mut app, Action::MoveDown);
        loaded(&mut app, &["only"]);
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn test_complete_targets_selected_task() {
        let mut app = App::new(LogicalFilter::Today);
        loaded(&mut app, &["a", "b"]);
        update(&mut app, Action::MoveDown);
        assert_eq!(
            update(&mut app, Action::CompleteSelected),
            Effect::Mutate(Mutation::Complete("b".to_string()))
        );
    }

    #[test]
    fn test_mutation_without_selection_is_noop() {
        let mut app = App::new(LogicalFilter::Today);
        assert_eq!(update(&mut app, Action::CompleteSelected), Effect::None);
        assert_eq!(app.status_message, "No task selected");
        assert_eq!(update(&mut app, Action::DeleteSelected), Effect::None);
        assert!(app.pending_delete.is_none());
    }

    #[test]
    fn test_delete_waits_for_confirmation() {
        let mut app = App::new(LogicalFilter::Today);
        loaded(&mut app, &["a", "b"]);
        update(&mut app, Action::MoveDown);

        assert_eq!(update(&mut app, Action::DeleteSelected), Effect::None);
        assert_eq!(app.pending_delete.as_ref().map(|p| p.task_id.as_str()), Some("b"));
        assert!(app.status_message.contains("(y/n)"));

        assert_eq!(
            update(&mut app, Action::ConfirmDelete(true)),
            Effect::Mutate(Mutation::Delete("b".to_string()))
        );
        assert!(app.pending_delete.is_none());
    }

    #[test]
    fn test_declined_delete_sends_nothing() {
        let mut app = App::new(LogicalFilter::Today);
        loaded(&mut app, &["a"]);
        update(&mut app, Action::DeleteSelected);

        assert_eq!(update(&mut app, Action::ConfirmDelete(false)), Effect::None);
        assert!(app.pending_delete.is_none());
        assert_eq!(app.status_message, "Delete cancelled");
        // A stray answer with nothing pending is ignored.
        assert_eq!(update(&mut app, Action::ConfirmDelete(true)), Effect::None);
    }

    #[test]
    fn test_project_selection_reloads_scoped() {
        let mut app = App::new(LogicalFilter::ThisWeek);
        loaded(&mut app, &["a", "b"]);
        update(&mut app, Action::MoveDown);

        let effect = update(&mut app, Action::SetProject(Some("p2".to_string())));
        assert!(matches!(
            effect,
            Effect::LoadTasks { filter: LogicalFilter::ThisWeek, project: Some(ref p), .. } if p == "p2"
        ));
        assert_eq!(app.selected, 0);

        let effect = update(&mut app, Action::SetProject(None));
        assert!(matches!(effect, Effect::LoadTasks { project: None, .. }));
    }

    #[test]
    fn test_detail_pane_loads_comments_for_selection() {
        let mut app = App::new(LogicalFilter::Today);
        let ticket = match update(&mut app, Action::Refresh { force: false }) {
            Effect::LoadTasks { ticket, .. } => ticket,
            other => panic!("expected load, got {other:?}"),
        };
        let effect = update(
            &mut app,
            Action::TasksLoaded {
                ticket,
                result: Ok(list(LogicalFilter::Today, &["a", "b"])),
            },
        );
        let Effect::LoadComments { ticket: first, task_id } = effect else {
            panic!("expected comments load, got {effect:?}");
        };
        assert_eq!(task_id, "a");

        let Effect::LoadComments { ticket: second, .. } = update(&mut app, Action::MoveDown) else {
            panic!("moving should load the next task's comments");
        };

        // The answer for "a" arrives late and is dropped.
        update(
            &mut app,
            Action::CommentsLoaded {
                ticket: first,
                task_id: "a".to_string(),
                result: Ok(Vec::new()),
            },
        );
        assert!(app.comments.is_none());

        update(
            &mut app,
            Action::CommentsLoaded {
                ticket: second,
                task_id: "b".to_string(),
                result: Ok(Vec::new()),
            },
        );
        assert_eq!(app.selected_comments().map(<[Comment]>::len), Some(0));
        // Only the shown task's comments are kept, so going back refetches.
        assert!(matches!(update(&mut app, Action::MoveUp), Effect::LoadComments { .. }));
    }

    #[test]
    fn test_hidden_details_skip_comment_loads() {
        let mut app = App::new(LogicalFilter::Today);
        loaded(&mut app, &["a", "b"]);
        update(&mut app, Action::ToggleDetails);
        assert!(!app.show_details);
        assert_eq!(update(&mut app, Action::MoveDown), Effect::None);

        assert!(matches!(
            update(&mut app, Action::ToggleDetails),
            Effect::LoadComments { ref task_id, .. } if task_id == "b"
        ));
    }

    #[test]
    fn test_comment_targets_selected_task() {
        let mut app = App::new(LogicalFilter::Today);
        loaded(&mut app, &["a"]);
        assert_eq!(update(&mut app, Action::AddComment("  ".to_string())), Effect::None);
        assert_eq!(
            update(&mut app, Action::AddComment(" Call back ".to_string())),
            Effect::Mutate(Mutation::AddComment("a".to_string(), "Call back".to_string()))
        );
    }

    #[test]
    fn test_successful_mutation_reloads() {
        let mut app = App::new(LogicalFilter::Overdue);
        let effect = update(
            &mut app,
            Action::MutationDone {
                mutation: Mutation::Delete("a".to_string()),
                result: Ok(()),
            },
        );
        assert!(matches!(
            effect,
            Effect::LoadTasks {
                filter: LogicalFilter::Overdue,
                force: false,
                ..
            }
        ));
        assert_eq!(app.status_message, "Deleted");
    }

    #[test]
    fn test_auth_failure_is_fatal_but_timeout_is_not() {
        let mut app = App::new(LogicalFilter::Today);
        update(
            &mut app,
            Action::MutationDone {
                mutation: Mutation::Complete("a".to_string()),
                result: Err(ServiceError::Timeout(std::time::Duration::from_secs(10))),
            },
        );
        assert!(app.error.is_none());
        assert!(app.status_message.starts_with("Error:"));

        update(
            &mut app,
            Action::CatalogLoaded(Err(ServiceError::Authentication("401".into()))),
        );
        assert!(app.error.is_some());
    }

    #[test]
    fn test_history_toggle() {
        let mut app = App::new(LogicalFilter::Today);
        update(&mut app, Action::ToggleHistory);
        assert_eq!(
            app.filter,
            LogicalFilter::All {
                include_completed: true
            }
        );
        update(&mut app, Action::ToggleHistory);
        assert_eq!(
            app.filter,
            LogicalFilter::All {
                include_completed: false
            }
        );
    }

    #[test]
    fn test_label_input_is_split_and_cleaned() {
        let mut app = App::new(LogicalFilter::Today);
        loaded(&mut app, &["a"]);
        assert_eq!(
            update(&mut app, Action::SetLabels("@urgent, home  work".to_string())),
            Effect::Mutate(Mutation::SetLabels(
                "a".to_string(),
                vec!["urgent".to_string(), "home".to_string(), "work".to_string()]
            ))
        );
    }

    #[test]
    fn test_blank_quick_add_is_ignored() {
        let mut app = App::new(LogicalFilter::Today);
        assert_eq!(update(&mut app, Action::QuickAdd("  ".to_string())), Effect::None);
        assert_eq!(
            update(&mut app, Action::QuickAdd(" Buy milk tomorrow ".to_string())),
            Effect::Mutate(Mutation::QuickAdd("Buy milk tomorrow".to_string()))
        );
    }
}
