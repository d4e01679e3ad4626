mod mouse;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

pub use mouse::handle_mouse;

use super::app::App;

/// Main key handler
pub fn handle_key(app: &mut App, key: KeyEvent) {
    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) | (_, KeyCode::Char('q')) => {
            app.controller.cancel();
            app.should_quit = true;
        }
        (_, KeyCode::Esc) => app.cancel_drag(),
        (_, KeyCode::Char('r')) => {
            app.status = None;
            app.reload_config();
            if app.status.is_none() {
                app.info("reloaded");
            }
        }
        (_, KeyCode::Down | KeyCode::Char('j')) => app.scroll = app.scroll.saturating_add(1),
        (_, KeyCode::Up | KeyCode::Char('k')) => app.scroll = app.scroll.saturating_sub(1),
        (_, KeyCode::Home | KeyCode::Char('g')) => app.scroll = 0,
        _ => {}
    }
}
