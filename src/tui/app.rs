use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::cli::output::format_target;
use crate::dnd::controller::{CommitOutcome, DndError, DragController};
use crate::dnd::dispatch::DispatchError;
use crate::dnd::geometry::Point;
use crate::dnd::hit_test::VisibleLayout;
use crate::io::board_io::FileStore;
use crate::io::lock::FileLock;
use crate::io::project_io::{discover_project, load_project};
use crate::io::recovery;
use crate::io::store::{StoreError, TaskStore};
use crate::io::watcher::{BoardWatcher, FileEvent};
use crate::model::{Board, Project, Row};
use crate::util::logging;

use super::input;
use super::render;
use super::theme::Theme;

/// Surface units per terminal row. `drag.hit_slop` is measured in these, so
/// the default slop of 20 reaches one row past a row's edge.
pub const ROW_UNITS: f64 = 20.0;

/// How long a drop waits for a CLI command holding the lock
const DROP_LOCK_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Error,
}

/// Message shown in the status row until the next one replaces it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub kind: StatusKind,
}

/// One drawn line of the board view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardLine {
    Row(Row),
    /// Closing line of a section's area (None = unsectioned); dropping a
    /// task here appends it to that section
    ZoneEnd(Option<String>),
}

/// Lines in draw order: each group's rows followed by its closing line
pub fn board_lines(layout: &VisibleLayout) -> Vec<BoardLine> {
    let mut lines = Vec::with_capacity(layout.rows.len() + layout.zones.len());
    let mut zone: Option<String> = None;
    for row in &layout.rows {
        if let Row::SectionHeader { id } = row {
            lines.push(BoardLine::ZoneEnd(zone.take()));
            zone = Some(id.clone());
        }
        lines.push(BoardLine::Row(row.clone()));
    }
    lines.push(BoardLine::ZoneEnd(zone));
    lines
}

/// Pointer position for a terminal cell. The point sits a quarter of the way
/// down the row, above its midline, so pointing at a row targets "before" it.
pub fn cell_to_point(column: u16, row: u16) -> Point {
    Point::new(f64::from(column), (f64::from(row) + 0.25) * ROW_UNITS)
}

/// Main application state
pub struct App {
    pub project: Project,
    pub store: FileStore,
    pub board: Board,
    pub controller: DragController,
    pub theme: Theme,
    pub status: Option<StatusMessage>,
    /// First board line shown
    pub scroll: usize,
    pub should_quit: bool,
}

impl App {
    pub fn new(project: Project) -> Result<Self, StoreError> {
        let store = FileStore::open(&project.data_dir, &project.config.project.id);
        let board = store.load_board()?;
        let mut controller = DragController::from_config(&project.config);
        controller.set_layout(VisibleLayout::from_board(&board));
        let theme = Theme::from_config(&project.config.ui);
        Ok(App {
            project,
            store,
            board,
            controller,
            theme,
            status: None,
            scroll: 0,
            should_quit: false,
        })
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind: StatusKind::Info,
        });
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind: StatusKind::Error,
        });
    }

    /// Drop any drag and re-read the board from the store
    pub fn reload(&mut self) {
        if self.controller.cancel() {
            self.info("drag cancelled: board reloaded");
        }
        match self.store.load_board() {
            Ok(board) => {
                self.board = board;
                self.controller
                    .set_layout(VisibleLayout::from_board(&self.board));
            }
            Err(e) => self.error(format!("reload failed: {}", e)),
        }
    }

    /// Re-read project.toml, then the board
    pub fn reload_config(&mut self) {
        match load_project(&self.project.root) {
            Ok(project) => {
                self.store = FileStore::open(&project.data_dir, &project.config.project.id);
                self.controller = DragController::from_config(&project.config);
                self.theme = Theme::from_config(&project.config.ui);
                self.project = project;
            }
            Err(e) => self.error(format!("project.toml: {}", e)),
        }
        self.reload();
    }

    /// React to board.json / project.toml changing on disk
    pub fn handle_file_events(&mut self, events: Vec<FileEvent>) {
        let config_changed = events.iter().any(|FileEvent::Changed(paths)| {
            paths
                .iter()
                .any(|p| p.file_name().is_some_and(|n| n == "project.toml"))
        });
        tracing::debug!(config_changed, "files changed on disk");
        if config_changed {
            self.reload_config();
        } else {
            self.reload();
        }
    }

    /// Pointer pressed: start dragging the row under it, if any
    pub fn begin_drag(&mut self, point: Point) {
        if self.controller.session().is_dragging() {
            return;
        }
        let Some(key) = self.controller.handle_at(point) else {
            return;
        };
        match self.controller.pointer_down(&self.board, &key, point) {
            Ok(()) => self.info(format!("dragging {} (Esc cancels)", key)),
            Err(e) => self.error(e.to_string()),
        }
    }

    pub fn drag_to(&mut self, point: Point) {
        if !self.controller.session().is_dragging() {
            return;
        }
        if let Err(e) = self.controller.pointer_move(point) {
            self.error(e.to_string());
        }
    }

    /// Pointer released: resolve the final target and commit the drop
    pub fn end_drag(&mut self, point: Point) {
        if !self.controller.session().is_dragging() {
            return;
        }
        if let Err(e) = self.controller.pointer_move(point) {
            self.error(e.to_string());
            return;
        }

        let _lock = match FileLock::acquire(&self.project.data_dir, DROP_LOCK_WAIT) {
            Ok(lock) => lock,
            Err(e) => {
                self.controller.cancel();
                self.error(format!("drop cancelled: {}", e));
                return;
            }
        };

        match self.controller.pointer_up(&mut self.board, &mut self.store) {
            Ok(outcome) => {
                let text = describe_commit(&outcome);
                self.info(text);
            }
            Err(e) => {
                if let DndError::Dispatch(ref dispatch_err) = e
                    && dispatch_err.diverged()
                    && let DispatchError::Failed { stranded, .. } = dispatch_err
                {
                    recovery::log_stranded_mutations(
                        &self.project.data_dir,
                        &dispatch_err.to_string(),
                        stranded,
                    );
                }
                tracing::warn!(error = %e, "drop failed");
                self.error(format!("drop failed: {}", e));
            }
        }
    }

    pub fn cancel_drag(&mut self) {
        if self.controller.cancel() {
            self.info("drag cancelled");
        }
    }
}

fn describe_commit(outcome: &CommitOutcome) -> String {
    let id = outcome.subject.id();
    if outcome.report.applied == 0 {
        return format!("{} stays where it is", id);
    }
    let target = format_target(&outcome.target);
    let text = match outcome.report.applied {
        1 => format!("moved {} {} (1 update)", id, target),
        n => format!("moved {} {} ({} updates)", id, target, n),
    };
    if outcome.resynced {
        text
    } else {
        format!("{}; board not reloaded, press r", text)
    }
}

/// Run the TUI against the project at (or above) `project_dir`
pub fn run(project_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let start = match project_dir {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    let root = discover_project(&start)?;
    let project = load_project(&root)?;
    logging::init_file(&project.data_dir);

    let mut app = App::new(project)?;

    let watcher = match BoardWatcher::start(&app.project.data_dir) {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "file watcher unavailable; use r to reload");
            None
        }
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Install panic hook to restore terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let result = run_event_loop(&mut terminal, &mut app, watcher.as_ref());

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    watcher: Option<&BoardWatcher>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|frame| render::render(frame, app))?;

        if event::poll(Duration::from_millis(250))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => input::handle_key(app, key),
                Event::Mouse(mouse) => input::handle_mouse(app, mouse),
                _ => {}
            }
        }

        if let Some(watcher) = watcher {
            let events = watcher.poll();
            if !events.is_empty() {
                app.handle_file_events(events);
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}
