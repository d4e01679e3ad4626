use super::geometry::Point;
use super::hit_test::{DragSubject, DropTarget};

/// Error type for drag session transitions
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("a drag of {0} is already in progress")]
    AlreadyDragging(String),
    #[error("no drag in progress")]
    NotDragging,
}

/// The single active drag
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveDrag {
    pub subject: DragSubject,
    /// Where the pointer went down
    pub origin: Point,
    /// Last reported pointer position
    pub position: Point,
    /// Target resolved at the last pointer position
    pub target: DropTarget,
}

/// What a finished drag hands to the planner
#[derive(Debug, Clone, PartialEq)]
pub struct DropCommit {
    pub subject: DragSubject,
    pub target: DropTarget,
}

/// Drag session state
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionState {
    #[default]
    Idle,
    Dragging(ActiveDrag),
}

/// Single-slot drag session: `Idle → Dragging → Idle`.
///
/// Starting a drag while one is active is rejected and leaves the active
/// drag untouched.
#[derive(Debug, Clone, Default)]
pub struct DragSession {
    state: SessionState,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, SessionState::Dragging(_))
    }

    pub fn active(&self) -> Option<&ActiveDrag> {
        match &self.state {
            SessionState::Dragging(drag) => Some(drag),
            SessionState::Idle => None,
        }
    }

    /// Idle → Dragging
    pub fn begin(&mut self, subject: DragSubject, origin: Point) -> Result<(), SessionError> {
        if let SessionState::Dragging(active) = &self.state {
            return Err(SessionError::AlreadyDragging(active.subject.id().to_string()));
        }
        tracing::debug!(subject = subject.id(), x = origin.x, y = origin.y, "drag started");
        self.state = SessionState::Dragging(ActiveDrag {
            subject,
            origin,
            position: origin,
            target: DropTarget::None,
        });
        Ok(())
    }

    /// Record a pointer move and the target freshly resolved for it
    pub fn update(&mut self, position: Point, target: DropTarget) -> Result<(), SessionError> {
        let SessionState::Dragging(drag) = &mut self.state else {
            return Err(SessionError::NotDragging);
        };
        if drag.target != target {
            tracing::debug!(subject = drag.subject.id(), ?target, "drop target changed");
        }
        drag.position = position;
        drag.target = target;
        Ok(())
    }

    /// Dragging → Idle, handing back whatever target was resolved last
    pub fn finish(&mut self) -> Result<DropCommit, SessionError> {
        match std::mem::take(&mut self.state) {
            SessionState::Dragging(drag) => {
                tracing::debug!(subject = drag.subject.id(), target = ?drag.target, "drag finished");
                Ok(DropCommit {
                    subject: drag.subject,
                    target: drag.target,
                })
            }
            SessionState::Idle => Err(SessionError::NotDragging),
        }
    }

    /// Drop the active drag without committing. Returns false when idle.
    pub fn cancel(&mut self) -> bool {
        let was_dragging = self.is_dragging();
        if was_dragging {
            tracing::debug!("drag cancelled");
        }
        self.state = SessionState::Idle;
        was_dragging
    }
}
