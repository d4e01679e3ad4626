use serde::Serialize;

use super::dispatch::{DispatchError, DispatchReport, Dispatcher};
use super::geometry::{GeometryKey, GeometryRegistry, Point};
use super::hit_test::{DragSubject, DropTarget, HitTester, VisibleLayout};
use super::planner::{PlanError, plan_drop};
use super::session::{DragSession, DropCommit, SessionError};
use crate::io::store::TaskStore;
use crate::model::board::{Board, Row};
use crate::model::config::ProjectConfig;

/// Error type for the pointer-driven drag flow
#[derive(Debug, thiserror::Error)]
pub enum DndError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{0} is not a draggable task or section")]
    NotDraggable(String),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Result of a completed pointer-up
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitOutcome {
    pub subject: DragSubject,
    pub target: DropTarget,
    /// Mutations planned, before no-op filtering
    pub planned: usize,
    pub report: DispatchReport,
    /// False when the store took the drop but could not be re-read; the
    /// caller's board is then stale until the next reload
    pub resynced: bool,
}

/// Wires pointer events through hit-testing, the drag session, the
/// planner and the dispatcher.
///
/// The surface keeps `registry` and `layout` current; the controller only
/// reads them.
#[derive(Debug, Default)]
pub struct DragController {
    registry: GeometryRegistry,
    layout: VisibleLayout,
    session: DragSession,
    hit_tester: HitTester,
    dispatcher: Dispatcher,
}

impl DragController {
    pub fn new(hit_tester: HitTester, dispatcher: Dispatcher) -> Self {
        DragController {
            hit_tester,
            dispatcher,
            ..Default::default()
        }
    }

    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(
            HitTester::new(config.drag.hit_slop),
            Dispatcher::new(config.dispatch.mode),
        )
    }

    pub fn registry(&self) -> &GeometryRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut GeometryRegistry {
        &mut self.registry
    }

    pub fn layout(&self) -> &VisibleLayout {
        &self.layout
    }

    pub fn set_layout(&mut self, layout: VisibleLayout) {
        self.layout = layout;
    }

    pub fn session(&self) -> &DragSession {
        &self.session
    }

    /// Target resolved at the last pointer move, if dragging
    pub fn current_target(&self) -> Option<&DropTarget> {
        self.session.active().map(|drag| &drag.target)
    }

    /// The task or section row under `point`, topmost in render order
    pub fn handle_at(&self, point: Point) -> Option<GeometryKey> {
        self.layout
            .rows
            .iter()
            .map(|row| match row {
                Row::SectionHeader { id } => GeometryKey::Section(id.clone()),
                Row::Task { id, .. } => GeometryKey::Task(id.clone()),
            })
            .find(|key| {
                self.registry
                    .rect_of(key)
                    .is_some_and(|rect| rect.contains(point))
            })
    }

    /// Start dragging the entity behind `key`
    pub fn pointer_down(
        &mut self,
        board: &Board,
        key: &GeometryKey,
        point: Point,
    ) -> Result<(), DndError> {
        let subject = DragSubject::from_board(board, key)
            .ok_or_else(|| DndError::NotDraggable(key.to_string()))?;
        self.session.begin(subject, point)?;
        Ok(())
    }

    /// Re-resolve the drop target for the new pointer position
    pub fn pointer_move(&mut self, point: Point) -> Result<&DropTarget, DndError> {
        let drag = self.session.active().ok_or(SessionError::NotDragging)?;
        let target = self
            .hit_tester
            .resolve(&drag.subject, point, &self.layout, &self.registry);
        self.session.update(point, target)?;
        self.current_target().ok_or(DndError::Session(SessionError::NotDragging))
    }

    /// End the drag: plan against `board`, dispatch, then reload `board`
    /// from the store. The session is idle afterwards whatever happens.
    pub fn pointer_up(
        &mut self,
        board: &mut Board,
        store: &mut dyn TaskStore,
    ) -> Result<CommitOutcome, DndError> {
        let DropCommit { subject, target } = self.session.finish()?;
        let plan = plan_drop(&subject, &target, board)?;
        if plan.is_empty() {
            tracing::debug!(subject = subject.id(), "drop changes nothing");
            return Ok(CommitOutcome {
                subject,
                target,
                planned: 0,
                report: DispatchReport::default(),
                resynced: true,
            });
        }

        let dispatched = self.dispatcher.dispatch(store, board, &plan);
        let resynced = match store.load_board() {
            Ok(fresh) => {
                *board = fresh;
                self.layout = VisibleLayout::from_board(board);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, dispatched = dispatched.is_ok(), "reload after drop failed");
                false
            }
        };

        let report = dispatched?;
        tracing::debug!(
            subject = subject.id(),
            applied = report.applied,
            skipped = report.skipped,
            "drop committed"
        );
        Ok(CommitOutcome {
            subject,
            target,
            planned: plan.len(),
            report,
            resynced,
        })
    }

    /// Abandon the active drag. Returns false when idle.
    pub fn cancel(&mut self) -> bool {
        self.session.cancel()
    }
}
