use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::cli::output::format_task_line;
use crate::dnd::geometry::{GeometryKey, Rect as SurfaceRect};
use crate::dnd::hit_test::{DropPosition, DropTarget};
use crate::model::Row;
use crate::tui::app::{App, BoardLine, ROW_UNITS, board_lines};
use crate::util::unicode::fit_to_width;

const GUTTER: usize = 2;

/// Render the board and register the geometry of every visible row and
/// section area for hit-testing
pub fn render_board_view(frame: &mut Frame, app: &mut App, area: Rect) {
    let lines = board_lines(app.controller.layout());
    let height = area.height as usize;
    app.scroll = app.scroll.min(lines.len().saturating_sub(height));

    register_geometry(app, &lines, area);

    let dragged = app
        .controller
        .session()
        .active()
        .map(|drag| drag.subject.id().to_string());
    let target = app.controller.current_target().cloned().unwrap_or_default();
    let width = area.width as usize;
    let show_order = app.project.config.ui.show_order;

    let mut out = Vec::with_capacity(height);
    let mut group_empty = true;
    for (i, line) in lines.iter().enumerate() {
        let visible = i >= app.scroll && i < app.scroll + height;
        let rendered = match line {
            BoardLine::Row(Row::SectionHeader { id }) => {
                group_empty = true;
                visible.then(|| section_line(app, id, &target, dragged.as_deref(), width, show_order))
            }
            BoardLine::Row(Row::Task { id, parent_task_id, .. }) => {
                group_empty = false;
                visible.then(|| {
                    task_line(
                        app,
                        id,
                        parent_task_id.is_some(),
                        &target,
                        dragged.as_deref(),
                        width,
                        show_order,
                    )
                })
            }
            BoardLine::ZoneEnd(zone) => {
                let line = visible.then(|| zone_end_line(app, zone.as_deref(), &target, group_empty));
                group_empty = true;
                line
            }
        };
        if let Some(line) = rendered {
            out.push(line);
        }
    }

    let bg = Style::default().bg(app.theme.background);
    frame.render_widget(Paragraph::new(out).style(bg), area);
}

/// Replace the registry contents with this frame's geometry. Lines scrolled
/// out of view are left unregistered; a section's area is clipped to the view.
fn register_geometry(app: &mut App, lines: &[BoardLine], area: Rect) {
    let top = app.scroll;
    let bottom = top + area.height as usize;
    let x = f64::from(area.x);
    let width = f64::from(area.width);
    let screen_y = |i: usize| (f64::from(area.y) + (i - top) as f64) * ROW_UNITS;

    let registry = app.controller.registry_mut();
    registry.clear();

    let mut zone_start = 0;
    for (i, line) in lines.iter().enumerate() {
        match line {
            BoardLine::Row(row) => {
                if i >= top && i < bottom {
                    let key = match row {
                        Row::SectionHeader { id } => GeometryKey::Section(id.clone()),
                        Row::Task { id, .. } => GeometryKey::Task(id.clone()),
                    };
                    registry.register(key, SurfaceRect::new(x, screen_y(i), width, ROW_UNITS));
                }
            }
            BoardLine::ZoneEnd(zone) => {
                let first = zone_start.max(top);
                let last = i.min(bottom.saturating_sub(1));
                if first <= last && first < bottom {
                    let rows = (last - first + 1) as f64;
                    registry.register(
                        GeometryKey::DropZone(zone.clone()),
                        SurfaceRect::new(x, screen_y(first), width, rows * ROW_UNITS),
                    );
                }
                zone_start = i + 1;
            }
        }
    }
}

fn gutter_for(id: &str, target: &DropTarget) -> &'static str {
    match target {
        DropTarget::Entity {
            id: target_id,
            position: DropPosition::Before,
        } if target_id == id => "\u{2191} ",
        DropTarget::Entity {
            id: target_id,
            position: DropPosition::After,
        } if target_id == id => "\u{2193} ",
        _ => "  ",
    }
}

fn section_line<'a>(
    app: &App,
    id: &str,
    target: &DropTarget,
    dragged: Option<&str>,
    width: usize,
    show_order: bool,
) -> Line<'a> {
    let theme = &app.theme;
    let text = match app.board.section(id) {
        Some(s) if show_order => format!("{} ({})  ({})", s.name, s.id, s.display_order),
        Some(s) => format!("{} ({})", s.name, s.id),
        None => id.to_string(),
    };
    let mut style = Style::default()
        .fg(theme.section)
        .bg(theme.background)
        .add_modifier(Modifier::BOLD);
    if dragged == Some(id) {
        style = style.bg(theme.drag_bg);
    }
    Line::from(vec![
        Span::styled(gutter_for(id, target), Style::default().fg(theme.target).bg(theme.background)),
        Span::styled(fit_to_width(&text, width.saturating_sub(GUTTER)), style),
    ])
}

fn task_line<'a>(
    app: &App,
    id: &str,
    is_subtask: bool,
    target: &DropTarget,
    dragged: Option<&str>,
    width: usize,
    show_order: bool,
) -> Line<'a> {
    let theme = &app.theme;
    let indent = if is_subtask { "  " } else { "" };
    let (text, completed) = match app.board.task(id) {
        Some(task) => (
            format!("{}{}", indent, format_task_line(task, show_order)),
            task.completed,
        ),
        None => (format!("{}{}", indent, id), false),
    };
    let fg = if completed { theme.dim } else { theme.text };
    let bg = if dragged == Some(id) {
        theme.drag_bg
    } else {
        theme.background
    };
    Line::from(vec![
        Span::styled(gutter_for(id, target), Style::default().fg(theme.target).bg(theme.background)),
        Span::styled(
            fit_to_width(&text, width.saturating_sub(GUTTER)),
            Style::default().fg(fg).bg(bg),
        ),
    ])
}

fn zone_end_line<'a>(app: &App, zone: Option<&str>, target: &DropTarget, empty: bool) -> Line<'a> {
    let theme = &app.theme;
    let targeted = matches!(
        target,
        DropTarget::SectionEnd { section_id } if section_id.as_deref() == zone
    );
    if targeted {
        return Line::from(Span::styled(
            "\u{2192} end of section",
            Style::default().fg(theme.target).bg(theme.background),
        ));
    }
    if empty {
        Line::from(Span::styled(
            "    (empty)",
            Style::default().fg(theme.dim).bg(theme.background),
        ))
    } else {
        Line::from("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::app::cell_to_point;
    use crate::tui::render::test_helpers::{TestProject, render_app};
    use pretty_assertions::assert_eq;

    #[test]
    fn board_renders_groups_in_order() {
        let mut fixture = TestProject::new();
        let output = render_app(&mut fixture.app, 44, 12);
        let expected = [
            " Demo  4 tasks",
            "  [ ] T-001 triage inbox",
            "",
            "  Now (S-001)",
            "  [ ] T-002 ship release",
            "    [x] T-003 tag build",
            "  [ ] T-004 write notes",
            "",
            "  Later (S-002)",
            "    (empty)",
            "",
            "                Esc cancel  r reload  q quit",
        ];
        assert_eq!(output, expected.join("\n"));
    }

    #[test]
    fn every_visible_row_and_zone_is_registered() {
        let mut fixture = TestProject::new();
        render_app(&mut fixture.app, 44, 12);
        let registry = fixture.app.controller.registry();
        // 4 tasks, 2 headers, 3 zones
        assert_eq!(registry.len(), 9);
        let t1 = registry.rect_of(&GeometryKey::Task("T-001".into())).unwrap();
        assert_eq!((t1.y, t1.height), (20.0, ROW_UNITS));
        let later = registry
            .rect_of(&GeometryKey::DropZone(Some("S-002".into())))
            .unwrap();
        // Header row 8 through the closing line on row 9
        assert_eq!((later.y, later.height), (160.0, 40.0));
    }

    #[test]
    fn scrolled_out_rows_are_not_registered() {
        let mut fixture = TestProject::new();
        fixture.app.scroll = 3;
        render_app(&mut fixture.app, 44, 6);
        let registry = fixture.app.controller.registry();
        assert!(registry.rect_of(&GeometryKey::Task("T-001".into())).is_none());
        // Line 3 (T-002) is now drawn on screen row 1
        let t2 = registry.rect_of(&GeometryKey::Task("T-002".into())).unwrap();
        assert_eq!(t2.y, 20.0);
    }

    #[test]
    fn target_marker_follows_the_pointer() {
        let mut fixture = TestProject::new();
        render_app(&mut fixture.app, 44, 12);
        // Grab T-004 (row 6) and hover over T-002 (row 4)
        fixture.app.begin_drag(cell_to_point(5, 6));
        fixture.app.drag_to(cell_to_point(5, 4));
        let output = render_app(&mut fixture.app, 44, 12);
        let row4 = output.lines().nth(4).unwrap();
        assert!(row4.starts_with("\u{2191} [ ] T-002"), "{row4}");
    }
}
