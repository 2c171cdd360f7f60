//! # TUI Adapter
//!
//! The ratatui-specific layer. Handles terminal I/O, renders the UI,
//! and translates keyboard events into core::Action values.
//!
//! This is the only module that knows about ratatui and crossterm.
//!
//! ## Effects
//!
//! `update()` hands back an [`Effect`]; service work is spawned on tokio and
//! its outcome comes back through an `mpsc` channel as another `Action`.
//! The loop never awaits, so redraws and key handling continue while a
//! request is in flight.

mod event;
mod palette;
mod ui;

pub use event::PromptKind;

use log::{debug, info, warn};
use std::io::stdout;
use std::sync::{Arc, mpsc};
use std::time::Duration;

use crossterm::event::{DisableBracketedPaste, EnableBracketedPaste};
use crossterm::execute;
use ratatui::widgets::TableState;

use crate::core::action::{Action, Effect, Mutation, update};
use crate::core::query::LogicalFilter;
use crate::core::state::App;
use crate::core::workspace::Workspace;
use crate::remote::ServiceError;
use crate::tui::event::{
    Command, TuiEvent, command_for, confirm_answer, poll_event_immediate, poll_event_timeout,
};

/// A line-input overlay opened from list mode.
pub struct Prompt {
    pub kind: PromptKind,
    pub buffer: String,
}

impl Prompt {
    pub fn new(kind: PromptKind) -> Self {
        Self {
            kind,
            buffer: String::new(),
        }
    }

    fn with_text(kind: PromptKind, text: String) -> Self {
        Self { kind, buffer: text }
    }

    fn into_action(self) -> Action {
        match self.kind {
            PromptKind::QuickAdd => Action::QuickAdd(self.buffer),
            PromptKind::AddParsed => Action::AddParsed(self.buffer),
            PromptKind::Edit => Action::EditSelected(self.buffer),
            PromptKind::Labels => Action::SetLabels(self.buffer),
            PromptKind::Comment => Action::AddComment(self.buffer),
        }
    }
}

/// Project chooser: "All projects" followed by every cached project.
pub struct ProjectPicker {
    /// `(project id, display name)`; `None` means all projects.
    pub entries: Vec<(Option<String>, String)>,
    pub selected: usize,
}

impl ProjectPicker {
    fn new(workspace: &Workspace, active: Option<&str>) -> Self {
        let projects = workspace.catalog().peek_projects();
        let entries: Vec<(Option<String>, String)> =
            std::iter::once((None, "All projects".to_string()))
                .chain(projects.into_iter().map(|p| (Some(p.id), p.name)))
                .collect();
        let selected = entries
            .iter()
            .position(|(id, _)| id.as_deref() == active)
            .unwrap_or(0);
        Self { entries, selected }
    }
}

/// TUI-specific presentation state (not part of core business logic)
pub struct TuiState {
    pub table_state: TableState,
    /// Open prompt (None = list mode)
    pub prompt: Option<Prompt>,
    pub picker: Option<ProjectPicker>,
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            table_state: TableState::default(),
            prompt: None,
            picker: None,
        }
    }
}

impl Default for TuiState {
    fn default() -> Self {
        Self::new()
    }
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> std::io::Result<Self> {
        execute!(stdout(), EnableBracketedPaste)?;
        info!("Terminal modes enabled (bracketed paste)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(stdout(), DisableBracketedPaste);
    }
}

/// Routes one event while a prompt is open. Returns the action to dispatch
/// when the prompt is submitted.
fn handle_prompt_event(tui: &mut TuiState, event: TuiEvent) -> Option<Action> {
    let prompt = tui.prompt.as_mut()?;
    match event {
        TuiEvent::InputChar(c) => prompt.buffer.push(c),
        TuiEvent::Paste(text) => prompt.buffer.push_str(&text.replace(['\n', '\r'], " ")),
        TuiEvent::Backspace => {
            prompt.buffer.pop();
        }
        TuiEvent::Escape => tui.prompt = None,
        TuiEvent::Submit => return tui.prompt.take().map(Prompt::into_action),
        _ => {}
    }
    None
}

/// Routes one event while the project picker is open. Returns the
/// selection once the user picks an entry.
fn handle_picker_event(tui: &mut TuiState, event: TuiEvent) -> Option<Action> {
    let picker = tui.picker.as_mut()?;
    match event {
        TuiEvent::CursorUp | TuiEvent::InputChar('k') => {
            picker.selected = picker.selected.saturating_sub(1);
        }
        TuiEvent::CursorDown | TuiEvent::InputChar('j') => {
            if picker.selected + 1 < picker.entries.len() {
                picker.selected += 1;
            }
        }
        TuiEvent::Escape | TuiEvent::InputChar('q') => tui.picker = None,
        TuiEvent::Submit => {
            let picker = tui.picker.take()?;
            let (project, _) = picker.entries.into_iter().nth(picker.selected)?;
            return Some(Action::SetProject(project));
        }
        _ => {}
    }
    None
}

/// Prefills edit prompts from the selected task.
fn open_prompt(app: &App, kind: PromptKind) -> Prompt {
    let selected = app.selected_task();
    match (kind, selected) {
        (PromptKind::Edit, Some(task)) => Prompt::with_text(kind, task.content.clone()),
        (PromptKind::Labels, Some(task)) => Prompt::with_text(kind, task.labels.join(", ")),
        _ => Prompt::new(kind),
    }
}

pub fn run(workspace: Arc<Workspace>, filter: LogicalFilter) -> std::io::Result<()> {
    let mut app = App::new(filter);
    let mut tui = TuiState::new();

    let mut terminal = ratatui::init();
    let _terminal_mode_guard = TerminalModeGuard::new();

    // Channel for actions from background tasks
    let (tx, rx) = mpsc::channel();

    spawn_catalog_refresh(&workspace, false, tx.clone());
    let initial = update(&mut app, Action::Refresh { force: false });
    run_effect(initial, &workspace, &tx);

    let mut needs_redraw = true; // Force first frame

    loop {
        // Only draw when something changed
        if needs_redraw {
            terminal.draw(|f| ui::draw_ui(f, &app, &mut tui, &workspace))?;
            needs_redraw = false;
        }

        // Short poll while a request is out so the spinner shows promptly
        let timeout = if app.is_loading {
            Duration::from_millis(80)
        } else {
            Duration::from_millis(500)
        };
        let first_event = poll_event_timeout(timeout);
        if first_event.is_some() {
            needs_redraw = true;
        }

        let mut should_quit = false;
        for event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            if matches!(event, TuiEvent::Resize) {
                continue;
            }
            if matches!(event, TuiEvent::ForceQuit) {
                should_quit = true;
                break;
            }

            let routed = if app.pending_delete.is_some() {
                Some(confirm_answer(&event).map(Action::ConfirmDelete))
            } else if tui.prompt.is_some() {
                Some(handle_prompt_event(&mut tui, event.clone()))
            } else if tui.picker.is_some() {
                Some(handle_picker_event(&mut tui, event.clone()))
            } else {
                None
            };
            if let Some(action) = routed {
                if let Some(action) = action {
                    let effect = update(&mut app, action);
                    should_quit |= run_effect(effect, &workspace, &tx);
                }
                continue;
            }

            match command_for(&event) {
                Some(Command::OpenPrompt(kind)) => tui.prompt = Some(open_prompt(&app, kind)),
                Some(Command::OpenProjectPicker) => {
                    tui.picker = Some(ProjectPicker::new(&workspace, app.project.as_deref()));
                }
                Some(Command::Dispatch(action)) => {
                    let effect = update(&mut app, action);
                    should_quit |= run_effect(effect, &workspace, &tx);
                }
                None => {}
            }
        }

        if should_quit {
            break;
        }

        // Handle background task actions (service responses)
        while let Ok(action) = rx.try_recv() {
            needs_redraw = true;
            debug!("Event loop received: {:?}", action);
            let effect = update(&mut app, action);
            if run_effect(effect, &workspace, &tx) {
                should_quit = true;
            }
        }

        if should_quit {
            break;
        }
    }

    ratatui::restore();
    Ok(())
}

/// Starts whatever I/O `effect` asks for. Returns true on quit.
fn run_effect(effect: Effect, workspace: &Arc<Workspace>, tx: &mpsc::Sender<Action>) -> bool {
    match effect {
        Effect::None => false,
        Effect::Quit => true,
        Effect::LoadTasks {
            ticket,
            filter,
            project,
            force,
        } => {
            if force {
                spawn_catalog_refresh(workspace, true, tx.clone());
            }
            spawn_load(workspace, ticket, filter, project, tx.clone());
            false
        }
        Effect::LoadComments { ticket, task_id } => {
            spawn_comments(workspace, ticket, task_id, tx.clone());
            false
        }
        Effect::Mutate(mutation) => {
            spawn_mutation(workspace, mutation, tx.clone());
            false
        }
    }
}

fn send(tx: &mpsc::Sender<Action>, action: Action) {
    if tx.send(action).is_err() {
        warn!("Failed to send action: receiver dropped");
    }
}

fn spawn_load(
    workspace: &Arc<Workspace>,
    ticket: u64,
    filter: LogicalFilter,
    project: Option<String>,
    tx: mpsc::Sender<Action>,
) {
    info!(
        "Loading tasks for {} in project {:?} (ticket {})",
        filter, project, ticket
    );
    let workspace = workspace.clone();
    tokio::spawn(async move {
        let result = workspace.fetch_tasks(&filter, project.as_deref()).await;
        send(&tx, Action::TasksLoaded { ticket, result });
    });
}

fn spawn_comments(
    workspace: &Arc<Workspace>,
    ticket: u64,
    task_id: String,
    tx: mpsc::Sender<Action>,
) {
    debug!("Loading comments for task {} (ticket {})", task_id, ticket);
    let workspace = workspace.clone();
    tokio::spawn(async move {
        let result = workspace.comments(&task_id).await;
        send(
            &tx,
            Action::CommentsLoaded {
                ticket,
                task_id,
                result,
            },
        );
    });
}

fn spawn_catalog_refresh(workspace: &Arc<Workspace>, force: bool, tx: mpsc::Sender<Action>) {
    let workspace = workspace.clone();
    tokio::spawn(async move {
        let result = match workspace.refresh_catalog(force).await {
            Ok(warnings) => Ok((
                workspace
                    .catalog()
                    .peek_filters()
                    .into_iter()
                    .map(|f| f.name)
                    .collect(),
                warnings.iter().map(ToString::to_string).collect(),
            )),
            Err(e) => Err(e),
        };
        send(&tx, Action::CatalogLoaded(result));
    });
}

fn spawn_mutation(workspace: &Arc<Workspace>, mutation: Mutation, tx: mpsc::Sender<Action>) {
    info!("Applying {:?}", mutation);
    let workspace = workspace.clone();
    tokio::spawn(async move {
        let result = apply(&workspace, &mutation).await;
        send(&tx, Action::MutationDone { mutation, result });
    });
}

async fn apply(workspace: &Workspace, mutation: &Mutation) -> Result<(), ServiceError> {
    match mutation {
        Mutation::Complete(id) => workspace.complete_task(id).await,
        Mutation::Delete(id) => workspace.delete_task(id).await,
        Mutation::SetPriority(id, priority) => workspace.set_priority(id, *priority).await.map(drop),
        Mutation::QuickAdd(text) => workspace.quick_add(text).await.map(drop),
        Mutation::AddParsed(text) => workspace.add_from_entry(text).await.map(drop),
        Mutation::Edit(id, text) => workspace.edit_task(id, text).await.map(drop),
        Mutation::SetLabels(id, names) => workspace.set_labels(id, names).await.map(drop),
        Mutation::AddComment(id, text) => workspace.add_comment(id, text).await.map(drop),
    }
}
