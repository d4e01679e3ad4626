use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::cli::output::format_target;
use crate::tui::app::{App, StatusKind};
use crate::util::unicode::{display_width, truncate_to_width};

const KEY_HINTS: &str = "Esc cancel  r reload  q quit";

/// Render the status row (bottom of screen)
pub fn render_status_row(frame: &mut Frame, app: &App, area: Rect) {
    let bg = app.theme.background;
    let width = area.width as usize;

    // While dragging, the live target wins over the last message
    let (text, color) = match (app.controller.session().active(), &app.status) {
        (Some(drag), _) => (
            format!("{} \u{2192} {}", drag.subject.id(), format_target(&drag.target)),
            app.theme.target,
        ),
        (None, Some(msg)) => (
            msg.text.clone(),
            match msg.kind {
                StatusKind::Info => app.theme.green,
                StatusKind::Error => app.theme.red,
            },
        ),
        (None, None) => (String::new(), app.theme.text),
    };

    let mut spans = vec![Span::styled(
        truncate_to_width(&text, width),
        Style::default().fg(color).bg(bg),
    )];
    let content_width = display_width(&spans[0].content);
    let hint_width = display_width(KEY_HINTS);
    if app.project.config.ui.show_key_hints && content_width + hint_width < width {
        let padding = width - content_width - hint_width;
        spans.push(Span::styled(" ".repeat(padding), Style::default().bg(bg)));
        spans.push(Span::styled(
            KEY_HINTS,
            Style::default().fg(app.theme.dim).bg(bg),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(bg));
    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::render::test_helpers::{TestProject, render_to_string};

    #[test]
    fn error_message_shows_without_hints_when_narrow() {
        let mut fixture = TestProject::new();
        fixture.app.error("drop failed: task not found: T-009");
        let output = render_to_string(40, 1, |frame, area| {
            render_status_row(frame, &fixture.app, area);
        });
        assert_eq!(output, "drop failed: task not found: T-009");
    }

    #[test]
    fn hints_can_be_turned_off() {
        let mut fixture = TestProject::new();
        fixture.app.project.config.ui.show_key_hints = false;
        fixture.app.info("moved T-004 before T-002 (2 updates)");
        let output = render_to_string(80, 1, |frame, area| {
            render_status_row(frame, &fixture.app, area);
        });
        assert_eq!(output, "moved T-004 before T-002 (2 updates)");
    }
}
