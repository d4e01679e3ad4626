use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};

use crate::tui::app::{App, cell_to_point};

/// Map crossterm mouse events onto the drag controller
pub fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let point = cell_to_point(mouse.column, mouse.row);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => app.begin_drag(point),
        MouseEventKind::Drag(MouseButton::Left) => app.drag_to(point),
        MouseEventKind::Up(MouseButton::Left) => app.end_drag(point),
        // Scrolling moves rows under a held pointer; drop the drag
        MouseEventKind::ScrollDown => {
            app.cancel_drag();
            app.scroll = app.scroll.saturating_add(1);
        }
        MouseEventKind::ScrollUp => {
            app.cancel_drag();
            app.scroll = app.scroll.saturating_sub(1);
        }
        _ => {}
    }
}
