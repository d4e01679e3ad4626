use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::layout::Rect;
use tempfile::TempDir;

use crate::io::board_io::FileStore;
use crate::io::project_io::{DATA_DIR, load_project};
use crate::ops::board_ops::{add_section, add_subtask, add_task, set_completed};
use crate::tui::app::App;

/// Render into an in-memory buffer and return plain text (no styles).
pub fn render_to_string<F>(w: u16, h: u16, f: F) -> String
where
    F: FnOnce(&mut ratatui::Frame, Rect),
{
    let backend = TestBackend::new(w, h);
    let mut terminal = Terminal::new(backend).unwrap();
    terminal
        .draw(|frame| {
            let area = frame.area();
            f(frame, area);
        })
        .unwrap();
    buffer_text(&terminal)
}

/// Render the whole app, as the event loop does
pub fn render_app(app: &mut App, w: u16, h: u16) -> String {
    let backend = TestBackend::new(w, h);
    let mut terminal = Terminal::new(backend).unwrap();
    terminal
        .draw(|frame| crate::tui::render::render(frame, app))
        .unwrap();
    buffer_text(&terminal)
}

fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
    let buf = terminal.backend().buffer().clone();
    let w = buf.area.width as usize;
    let lines: Vec<String> = buf
        .content
        .chunks(w)
        .map(|row| {
            let s: String = row.iter().map(|cell| cell.symbol()).collect();
            s.trim_end().to_string()
        })
        .collect();

    // Trim trailing blank lines
    let end = lines
        .iter()
        .rposition(|l| !l.is_empty())
        .map_or(0, |i| i + 1);
    lines[..end].join("\n")
}

/// A project on disk with an app open on it:
///
/// ```text
/// T-001 triage inbox
/// S-001 Now
///   T-002 ship release
///     T-003 tag build (done)
///   T-004 write notes
/// S-002 Later
/// ```
pub struct TestProject {
    pub dir: TempDir,
    pub app: App,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join(DATA_DIR);
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::write(
            data_dir.join("project.toml"),
            "[project]\nname = \"Demo\"\nid = \"demo\"\n",
        )
        .unwrap();

        let mut store = FileStore::open(&data_dir, "demo");
        let now = add_section(&mut store, "Now").unwrap();
        add_section(&mut store, "Later").unwrap();
        add_task(&mut store, "triage inbox", None).unwrap();
        let ship = add_task(&mut store, "ship release", Some(&now.id)).unwrap();
        add_subtask(&mut store, &ship.id, "tag build").unwrap();
        add_task(&mut store, "write notes", Some(&now.id)).unwrap();
        set_completed(&mut store, "T-003", true).unwrap();

        let project = load_project(dir.path()).unwrap();
        let app = App::new(project).unwrap();
        TestProject { dir, app }
    }
}
