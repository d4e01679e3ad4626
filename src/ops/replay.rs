//! Pointer scripts: a JSON description of element rects and pointer events,
//! run through the same controller the TUI uses.

use serde::{Deserialize, Serialize};

use crate::dnd::controller::{CommitOutcome, DragController};
use crate::dnd::geometry::{GeometryKey, Point, Rect};
use crate::dnd::hit_test::{DropTarget, VisibleLayout};
use crate::io::store::{StoreError, TaskStore};
use crate::model::board::{Board, Row};

/// Error type for loading or running a script
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("could not parse script: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A recorded pointer session
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Script {
    /// Lay out every visible row `row_height` tall, top to bottom, with
    /// section drop-zones spanning each section's rows
    #[serde(default)]
    pub row_height: Option<f64>,
    /// Explicit rects, applied after the automatic layout
    #[serde(default)]
    pub rects: Vec<ScriptRect>,
    pub events: Vec<ScriptEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptRect {
    #[serde(flatten)]
    pub key: ScriptKey,
    /// `[x, y, width, height]`
    pub rect: [f64; 4],
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScriptKey {
    Task { id: String },
    Section { id: String },
    /// Drop-zone of a section; no `section` means the unsectioned area
    Zone {
        #[serde(default)]
        section: Option<String>,
    },
}

impl From<ScriptKey> for GeometryKey {
    fn from(key: ScriptKey) -> Self {
        match key {
            ScriptKey::Task { id } => GeometryKey::Task(id),
            ScriptKey::Section { id } => GeometryKey::Section(id),
            ScriptKey::Zone { section } => GeometryKey::DropZone(section),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScriptEvent {
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up,
    Cancel,
}

/// What one event did
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StepResult {
    Down { subject: Option<String> },
    Move { target: Option<DropTarget> },
    Up { outcome: CommitOutcome },
    Cancel { cancelled: bool },
    /// The event was rejected; the script carries on
    Error { message: String },
}

impl Script {
    pub fn from_json(text: &str) -> Result<Script, ReplayError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Register rects for `board` as a stack of `row_height` rows, replacing
/// whatever was registered before, and return the layout that matches them
pub fn stack_layout(controller: &mut DragController, board: &Board, row_height: f64) -> VisibleLayout {
    let layout = VisibleLayout::from_board(board);
    let registry = controller.registry_mut();
    registry.clear();
    let mut zone_start = 0.0;
    let mut zone: Option<String> = None;
    let mut y = 0.0;
    for row in &layout.rows {
        let key = match row {
            Row::SectionHeader { id } => {
                registry.register(
                    GeometryKey::DropZone(zone.take()),
                    Rect::new(0.0, zone_start, 100.0, y - zone_start),
                );
                zone = Some(id.clone());
                zone_start = y;
                GeometryKey::Section(id.clone())
            }
            Row::Task { id, .. } => GeometryKey::Task(id.clone()),
        };
        registry.register(key, Rect::new(0.0, y, 100.0, row_height));
        y += row_height;
    }
    // Last zone runs to the bottom, one spare row past the last item
    registry.register(
        GeometryKey::DropZone(zone),
        Rect::new(0.0, zone_start, 100.0, y + row_height - zone_start),
    );
    layout
}

/// Run `script` against the store, returning one result per event
pub fn run_script(
    script: Script,
    controller: &mut DragController,
    store: &mut dyn TaskStore,
) -> Result<Vec<StepResult>, ReplayError> {
    let mut board = store.load_board()?;
    let mut layout = VisibleLayout::from_board(&board);
    if let Some(height) = script.row_height {
        layout = stack_layout(controller, &board, height);
    }
    register_rects(controller, &script.rects);
    controller.set_layout(layout);

    let mut results = Vec::with_capacity(script.events.len());
    for event in script.events {
        let step = match event {
            ScriptEvent::Down { x, y } => {
                let point = Point::new(x, y);
                match controller.handle_at(point) {
                    None => StepResult::Down { subject: None },
                    Some(key) => match controller.pointer_down(&board, &key, point) {
                        Ok(()) => StepResult::Down {
                            subject: Some(key.to_string()),
                        },
                        Err(e) => error_step(e),
                    },
                }
            }
            ScriptEvent::Move { x, y } => {
                if controller.session().is_dragging() {
                    match controller.pointer_move(Point::new(x, y)) {
                        Ok(target) => StepResult::Move {
                            target: Some(target.clone()),
                        },
                        Err(e) => error_step(e),
                    }
                } else {
                    StepResult::Move { target: None }
                }
            }
            ScriptEvent::Up => match controller.pointer_up(&mut board, store) {
                Ok(outcome) => {
                    // The controller relaid the board; keep scripted geometry
                    if let Some(height) = script.row_height {
                        let layout = stack_layout(controller, &board, height);
                        register_rects(controller, &script.rects);
                        controller.set_layout(layout);
                    }
                    StepResult::Up { outcome }
                }
                Err(e) => error_step(e),
            },
            ScriptEvent::Cancel => StepResult::Cancel {
                cancelled: controller.cancel(),
            },
        };
        results.push(step);
    }
    Ok(results)
}

fn register_rects(controller: &mut DragController, rects: &[ScriptRect]) {
    for r in rects {
        let [x, y, w, h] = r.rect;
        controller
            .registry_mut()
            .register(r.key.clone().into(), Rect::new(x, y, w, h));
    }
}

fn error_step(e: impl std::fmt::Display) -> StepResult {
    StepResult::Error {
        message: e.to_string(),
    }
}
