use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};

use crate::core::action::Action;

/// TUI-specific input events
#[derive(Debug, Clone, PartialEq)]
pub enum TuiEvent {
    /// Ctrl+C, quits from any mode
    ForceQuit,
    Resize,
    Submit,
    Escape,
    Backspace,
    CursorUp,
    CursorDown,
    InputChar(char),
    Paste(String),
}

/// Which line-input prompt a key opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    QuickAdd,
    AddParsed,
    Edit,
    Labels,
    Comment,
}

impl PromptKind {
    pub fn title(&self) -> &'static str {
        match self {
            PromptKind::QuickAdd => "Quick add (e.g. Buy milk tomorrow #Errands @store)",
            PromptKind::AddParsed => "Add (text, #project, @label, due phrase)",
            PromptKind::Edit => "Edit (text, #project, @label, due phrase)",
            PromptKind::Labels => "Labels (comma separated)",
            PromptKind::Comment => "Comment",
        }
    }
}

/// What a key press in list mode means.
#[derive(Debug)]
pub enum Command {
    Dispatch(Action),
    OpenPrompt(PromptKind),
    OpenProjectPicker,
}

/// Maps list-mode events onto commands.
pub fn command_for(event: &TuiEvent) -> Option<Command> {
    let action = match event {
        TuiEvent::CursorUp | TuiEvent::InputChar('k') => Action::MoveUp,
        TuiEvent::CursorDown | TuiEvent::InputChar('j') => Action::MoveDown,
        TuiEvent::InputChar('q') | TuiEvent::ForceQuit => Action::Quit,
        TuiEvent::InputChar('f') => Action::CycleFilter,
        TuiEvent::InputChar('h') => Action::ToggleHistory,
        TuiEvent::InputChar('r') => Action::Refresh { force: true },
        TuiEvent::InputChar('c') => Action::CompleteSelected,
        TuiEvent::InputChar('d') => Action::DeleteSelected,
        TuiEvent::InputChar('i') => Action::ToggleDetails,
        TuiEvent::InputChar(c @ '1'..='4') => {
            // The keys read like the web UI's P1..P4, the API counts the other way.
            let shown = c.to_digit(10).unwrap_or(4) as u8;
            Action::SetPriority(5 - shown)
        }
        TuiEvent::InputChar('a') => return Some(Command::OpenPrompt(PromptKind::QuickAdd)),
        TuiEvent::InputChar('e') => return Some(Command::OpenPrompt(PromptKind::Edit)),
        TuiEvent::InputChar('l') => return Some(Command::OpenPrompt(PromptKind::Labels)),
        TuiEvent::InputChar('A') => return Some(Command::OpenPrompt(PromptKind::AddParsed)),
        TuiEvent::InputChar('n') => return Some(Command::OpenPrompt(PromptKind::Comment)),
        TuiEvent::InputChar('p') => return Some(Command::OpenProjectPicker),
        _ => return None,
    };
    Some(Command::Dispatch(action))
}

/// Reads a y/n answer while a delete waits for confirmation.
pub fn confirm_answer(event: &TuiEvent) -> Option<bool> {
    match event {
        TuiEvent::InputChar('y' | 'Y') => Some(true),
        TuiEvent::InputChar('n' | 'N') | TuiEvent::Escape => Some(false),
        _ => None,
    }
}

/// Poll for an event without blocking (returns immediately)
pub fn poll_event_immediate() -> Option<TuiEvent> {
    poll_event_timeout(std::time::Duration::ZERO)
}

/// Poll for an event, blocking up to `timeout`
pub fn poll_event_timeout(timeout: std::time::Duration) -> Option<TuiEvent> {
    if !event::poll(timeout).unwrap_or(false) {
        return None;
    }
    match event::read().ok()? {
        Event::Key(key_event) if key_event.kind != KeyEventKind::Release => {
            log::debug!(
                "Key event: {:?} with modifiers {:?}",
                key_event.code,
                key_event.modifiers
            );
            match (key_event.modifiers, key_event.code) {
                (KeyModifiers::CONTROL, KeyCode::Char('c')) => Some(TuiEvent::ForceQuit),
                (_, KeyCode::Char(c)) => Some(TuiEvent::InputChar(c)),
                (_, KeyCode::Backspace) => Some(TuiEvent::Backspace),
                (_, KeyCode::Enter) => Some(TuiEvent::Submit),
                (_, KeyCode::Esc) => Some(TuiEvent::Escape),
                (_, KeyCode::Up) => Some(TuiEvent::CursorUp),
                (_, KeyCode::Down) => Some(TuiEvent::CursorDown),
                _ => None,
            }
        }
        Event::Paste(data) => Some(TuiEvent::Paste(data)),
        Event::Resize(_, _) => Some(TuiEvent::Resize),
        _ => None,
    }
}
