use chrono::Utc;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, Wrap,
};

use crate::core::state::App;
use crate::core::workspace::Workspace;
use crate::remote::Task;
use crate::tui::TuiState;
use crate::tui::palette::{priority_color, todoist_color};

const HELP: &str = "j/k move  f filter  p project  h history  r refresh  c complete  d delete  1-4 priority  a/A add  e edit  l labels  n comment  i details  q quit";

pub fn draw_ui(frame: &mut Frame, app: &App, tui: &mut TuiState, workspace: &Workspace) {
    use Constraint::{Length, Min};
    let prompt_height = if tui.prompt.is_some() || app.pending_delete.is_some() {
        3
    } else {
        0
    };
    let warning_height = app.warnings.len().min(3) as u16;
    let layout = Layout::vertical([
        Length(1),
        Length(warning_height),
        Min(0),
        Length(prompt_height),
        Length(1),
    ]);
    let [title_area, warning_area, main_area, prompt_area, help_area] =
        layout.areas(frame.area());

    frame.render_widget(title_line(app, workspace), title_area);

    if warning_height > 0 {
        let lines: Vec<Line> = app
            .warnings
            .iter()
            .take(3)
            .map(|w| Line::styled(format!("⚠ {w}"), Style::default().fg(Color::Yellow)))
            .collect();
        frame.render_widget(Paragraph::new(lines), warning_area);
    }

    // Main area - show error OR tasks
    if let Some(error_msg) = &app.error {
        draw_error_view(frame, main_area, error_msg);
    } else if app.show_details {
        let [table_area, detail_area] =
            Layout::vertical([Constraint::Percentage(65), Constraint::Percentage(35)])
                .areas(main_area);
        draw_task_table(frame, table_area, app, tui, workspace);
        draw_detail_pane(frame, detail_area, app, workspace);
    } else {
        draw_task_table(frame, main_area, app, tui, workspace);
    }

    if let Some(pending) = &app.pending_delete {
        let question = Paragraph::new(format!("Delete \"{}\"? (y/n)", pending.content))
            .style(Style::default().fg(Color::Red))
            .block(Block::bordered().title("Confirm delete"));
        frame.render_widget(question, prompt_area);
    } else if let Some(prompt) = &tui.prompt {
        let input = Paragraph::new(prompt.buffer.as_str())
            .block(Block::bordered().title(prompt.kind.title()));
        frame.render_widget(input, prompt_area);
    }

    if tui.picker.is_some() {
        draw_project_picker(frame, main_area, tui, workspace);
    }

    frame.render_widget(
        Span::styled(HELP, Style::default().add_modifier(Modifier::DIM)),
        help_area,
    );
}

fn title_line(app: &App, workspace: &Workspace) -> Line<'static> {
    let spinner = if app.is_loading { " ⟳" } else { "" };
    let project = match &app.project {
        Some(id) => workspace
            .catalog()
            .project_name(id)
            .unwrap_or_else(|| id.clone()),
        None => "All projects".to_string(),
    };
    Line::from(vec![
        Span::styled(
            format!(" tuidoist · {project} · {}", app.filter),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(spinner),
        Span::raw(" | "),
        Span::raw(app.status_message.clone()),
    ])
}

fn draw_error_view(frame: &mut Frame, area: Rect, error_msg: &str) {
    use ratatui::layout::Alignment;

    let error_paragraph = Paragraph::new(error_msg)
        .block(Block::bordered().title("ERROR"))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    frame.render_widget(error_paragraph, area);
}

fn draw_task_table(
    frame: &mut Frame,
    area: Rect,
    app: &App,
    tui: &mut TuiState,
    workspace: &Workspace,
) {
    let catalog = workspace.catalog();
    let offset = workspace.basis().offset_at(Utc::now());

    let rows: Vec<Row> = app
        .tasks
        .iter()
        .map(|task| {
            let project = catalog
                .project_name(&task.project_id)
                .unwrap_or_else(|| task.project_id.clone());
            let project_color = catalog
                .project_color(&task.project_id)
                .map_or(Color::Reset, |c| todoist_color(&c));
            let labels: Vec<Span> = task
                .labels
                .iter()
                .map(|name| {
                    let color = catalog
                        .label_color(name)
                        .map_or(Color::Reset, |c| todoist_color(&c));
                    Span::styled(format!("@{name} "), Style::default().fg(color))
                })
                .collect();

            let style = if task.checked {
                Style::default().add_modifier(Modifier::CROSSED_OUT | Modifier::DIM)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(Span::styled(
                    priority_badge(task.priority),
                    Style::default().fg(priority_color(task.priority)),
                )),
                Cell::from(task.content.clone()),
                Cell::from(due_label(task, offset)),
                Cell::from(Span::styled(project, Style::default().fg(project_color))),
                Cell::from(Line::from(labels)),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Fill(3),
            Constraint::Length(18),
            Constraint::Fill(1),
            Constraint::Fill(1),
        ],
    )
    .header(
        Row::new(vec!["", "Task", "Due", "Project", "Labels"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::bordered())
    .row_highlight_style(Style::default().bg(Color::DarkGray));

    tui.table_state
        .select((!app.tasks.is_empty()).then_some(app.selected));
    frame.render_stateful_widget(table, area, &mut tui.table_state);
}

fn draw_detail_pane(frame: &mut Frame, area: Rect, app: &App, workspace: &Workspace) {
    let block = Block::bordered().title("Details");
    let Some(task) = app.selected_task() else {
        let hint = Paragraph::new("Select a task to view additional details").block(block);
        frame.render_widget(hint, area);
        return;
    };

    let label = |name: &str| {
        Span::styled(
            format!("{name}: "),
            Style::default().add_modifier(Modifier::BOLD),
        )
    };
    let mut lines = vec![Line::styled(
        task.content.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if !task.description.trim().is_empty() {
        lines.push(Line::from(task.description.clone()));
    }
    if let Some(due) = &task.due {
        let mut text = due_label(task, workspace.basis().offset_at(Utc::now()));
        if let Some(tz) = &due.timezone {
            text.push_str(&format!(" ({tz})"));
        }
        if !due.string.is_empty() {
            text.push_str(&format!("  \"{}\"", due.string));
        }
        lines.push(Line::from(vec![label("Due"), Span::raw(text)]));
    }
    let project = workspace
        .catalog()
        .project_name(&task.project_id)
        .unwrap_or_else(|| task.project_id.clone());
    lines.push(Line::from(vec![label("Project"), Span::raw(project)]));
    if task.priority > 1 {
        lines.push(Line::from(vec![
            label("Priority"),
            Span::styled(
                priority_badge(task.priority),
                Style::default().fg(priority_color(task.priority)),
            ),
        ]));
    }
    if !task.labels.is_empty() {
        lines.push(Line::from(vec![
            label("Labels"),
            Span::raw(task.labels.join(", ")),
        ]));
    }
    if let Some(added) = &task.added_at {
        lines.push(Line::from(vec![label("Created"), Span::raw(added.clone())]));
    }
    if let Some(updated) = &task.updated_at {
        lines.push(Line::from(vec![label("Updated"), Span::raw(updated.clone())]));
    }

    match app.selected_comments() {
        None => lines.push(Line::styled(
            "Loading comments…",
            Style::default().add_modifier(Modifier::DIM),
        )),
        Some([]) => {}
        Some(comments) => {
            lines.push(Line::from(label(&format!("Comments ({})", comments.len()))));
            for comment in comments {
                let when = comment.posted_at.as_deref().map(|p| p.get(..10).unwrap_or(p));
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("  {} ", when.unwrap_or("")),
                        Style::default().add_modifier(Modifier::DIM),
                    ),
                    Span::raw(comment.content.clone()),
                ]));
            }
        }
    }

    let details = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(details, area);
}

fn draw_project_picker(frame: &mut Frame, area: Rect, tui: &TuiState, workspace: &Workspace) {
    let Some(picker) = &tui.picker else {
        return;
    };
    let catalog = workspace.catalog();
    let items: Vec<ListItem> = picker
        .entries
        .iter()
        .map(|(id, name)| {
            let color = id
                .as_deref()
                .and_then(|id| catalog.project_color(id))
                .map_or(Color::Reset, |c| todoist_color(&c));
            ListItem::new(Span::styled(name.clone(), Style::default().fg(color)))
        })
        .collect();

    let height = (picker.entries.len() as u16 + 2).min(area.height);
    let width = 40.min(area.width);
    let popup = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };
    let list = List::new(items)
        .block(Block::bordered().title("Project (Enter select, Esc cancel)"))
        .highlight_style(Style::default().bg(Color::DarkGray));
    let mut state = ListState::default().with_selected(Some(picker.selected));
    frame.render_widget(Clear, popup);
    frame.render_stateful_widget(list, popup, &mut state);
}

fn priority_badge(priority: u8) -> String {
    if priority > 1 {
        format!("P{}", 5 - priority.min(4))
    } else {
        String::new()
    }
}

fn due_label(task: &Task, offset: chrono::FixedOffset) -> String {
    let Some(due) = &task.due else {
        return String::new();
    };
    let mut label = match (due.resolve_date(offset), due.resolve_time(offset)) {
        (Some(date), Some(time)) => format!("{} {}", date.format("%Y-%m-%d"), time.format("%H:%M")),
        (Some(date), None) => date.format("%Y-%m-%d").to_string(),
        _ => due.string.clone(),
    };
    if due.is_recurring {
        label.push_str(" ↻");
    }
    label
}
