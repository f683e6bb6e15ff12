//! Keyboard input handling for the TUI.

use crate::app::{App, AppEvent};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;

use super::loop_runner::Action;

/// Maps one key press to a state change.
pub(super) fn handle_input(
    app: &mut App,
    key: KeyEvent,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    // Windows reports releases too
    if key.kind == KeyEventKind::Release {
        return Action::Continue;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => return Action::Quit,
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => return Action::Quit,
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => app.nav_down(),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => app.nav_up(),
        (KeyCode::Char('g'), _) | (KeyCode::Home, _) => app.nav_first(),
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => app.nav_last(),
        (KeyCode::Char('r'), _) => {
            app.start_refresh(event_tx);
            app.set_status("Refreshing...");
        }
        _ => {}
    }

    Action::Continue
}
